//! YAML manifest parsing
//!
//! Parses with yaml-rust2 and converts to `serde_json::Value`, so typed
//! Kubernetes structs are deserialized through their JSON field names.

use serde_json::{Map, Number, Value};
use thiserror::Error;
use yaml_rust2::{Yaml, YamlLoader};

/// Error type for YAML parsing
#[derive(Debug, Error)]
pub enum YamlError {
    /// Input is not valid YAML
    #[error("invalid YAML: {0}")]
    Syntax(String),
    /// Input is valid YAML but has no document, or only a null one
    #[error("YAML input contains no document")]
    Empty,
    /// A construct with no JSON equivalent
    #[error("unsupported YAML: {0}")]
    Unsupported(String),
}

/// Parse the first document of a YAML string into a `serde_json::Value`.
pub fn parse_yaml(input: &str) -> Result<Value, YamlError> {
    let docs = YamlLoader::load_from_str(input).map_err(|e| YamlError::Syntax(e.to_string()))?;
    match docs.into_iter().next() {
        Some(Yaml::Null) | None => Err(YamlError::Empty),
        Some(doc) => yaml_to_json(doc),
    }
}

fn yaml_to_json(yaml: Yaml) -> Result<Value, YamlError> {
    match yaml {
        Yaml::Null => Ok(Value::Null),
        Yaml::Boolean(b) => Ok(Value::Bool(b)),
        Yaml::Integer(i) => Ok(Value::Number(i.into())),
        Yaml::Real(s) => {
            let f: f64 = s
                .parse()
                .map_err(|e: std::num::ParseFloatError| YamlError::Syntax(e.to_string()))?;
            Ok(Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null))
        }
        Yaml::String(s) => Ok(Value::String(s)),
        Yaml::Array(items) => items
            .into_iter()
            .map(yaml_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Yaml::Hash(map) => map
            .into_iter()
            .map(|(k, v)| Ok((yaml_key(k)?, yaml_to_json(v)?)))
            .collect::<Result<Map<String, Value>, YamlError>>()
            .map(Value::Object),
        Yaml::Alias(_) => Err(YamlError::Unsupported("aliases".to_string())),
        Yaml::BadValue => Err(YamlError::Syntax("bad value".to_string())),
    }
}

fn yaml_key(key: Yaml) -> Result<String, YamlError> {
    match key {
        Yaml::String(s) | Yaml::Real(s) => Ok(s),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Boolean(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        _ => Err(YamlError::Unsupported("non-scalar mapping key".to_string())),
    }
}
