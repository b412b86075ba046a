//! Agent query rules (`key=value` tokens) and the container overrides they request

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use tracing::debug;

use crate::quantity::parse_quantity;

/// Rule key overriding the primary container image
pub const IMAGE_KEY: &str = "image";
/// Rule key overriding the CPU request
pub const CPU_KEY: &str = "cpu";
/// Rule key overriding the memory request
pub const MEMORY_KEY: &str = "memory";

/// Split a token into key and value.
///
/// Returns `None` unless the token contains exactly one `=`.
pub fn split_rule(token: &str) -> Option<(&str, &str)> {
    let (key, value) = token.split_once('=')?;
    if value.contains('=') {
        return None;
    }
    Some((key, value))
}

/// Overrides requested by a list of query rules, last write wins per key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOverrides {
    pub image: Option<String>,
    pub requests: BTreeMap<String, Quantity>,
}

impl RuleOverrides {
    /// Collect overrides from raw tokens.
    ///
    /// Malformed tokens, unknown keys, empty values and unparseable quantities
    /// are skipped; a skipped rule never clears an earlier valid one.
    pub fn from_rules<S: AsRef<str>>(rules: &[S]) -> Self {
        let mut overrides = Self::default();

        for token in rules {
            let token = token.as_ref();
            let Some((key, value)) = split_rule(token) else {
                debug!(rule = %token, "ignoring malformed query rule");
                continue;
            };
            if value.is_empty() {
                debug!(rule = %token, "ignoring query rule with empty value");
                continue;
            }

            match key {
                IMAGE_KEY => overrides.image = Some(value.to_string()),
                CPU_KEY | MEMORY_KEY => match parse_quantity(value) {
                    Ok(quantity) => {
                        overrides.requests.insert(key.to_string(), quantity);
                    }
                    Err(e) => debug!(rule = %token, error = %e, "ignoring unparseable quantity"),
                },
                _ => {}
            }
        }

        overrides
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.requests.is_empty()
    }

    /// Apply the overrides to `container`, keeping every other request intact.
    pub fn apply(&self, container: &mut Container) {
        if let Some(image) = &self.image {
            container.image = Some(image.clone());
        }
        if self.requests.is_empty() {
            return;
        }

        let requests = container
            .resources
            .get_or_insert_with(ResourceRequirements::default)
            .requests
            .get_or_insert_with(BTreeMap::new);
        for (name, quantity) in &self.requests {
            requests.insert(name.clone(), quantity.clone());
        }
    }
}
