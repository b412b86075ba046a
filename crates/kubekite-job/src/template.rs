//! The Job template every launched Job is cloned from
//!
//! Loaded once at startup. A template that cannot be read, parsed, or that
//! has no container to run the agent in is a startup failure.

use std::path::Path;

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Container;
use serde_json::Value;
use tracing::info;

use kubekite_common::yaml::parse_yaml;
use kubekite_common::Error;

/// Immutable, validated Job manifest.
#[derive(Debug, Clone)]
pub struct JobTemplate {
    job: Job,
    primary_container_name: String,
}

impl JobTemplate {
    /// Wrap an already parsed Job, checking it has a primary container.
    pub fn from_job(job: Job) -> Result<Self, Error> {
        let primary_container_name = primary_container(&job)
            .map(|c| c.name.clone())
            .ok_or_else(|| {
                Error::template("spec.template.spec.containers must contain at least one container")
            })?;
        Ok(Self {
            job,
            primary_container_name,
        })
    }

    /// Parse a YAML Job manifest.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, Error> {
        Self::from_job(parse_job(yaml)?)
    }

    /// Read and parse a YAML Job manifest from disk.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let source = path.display().to_string();
        let yaml = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| {
                Error::template_at(&source, format!("could not open job template: {e}"))
            })?;
        let template = parse_job(&yaml).and_then(Self::from_job).map_err(|e| match e {
            Error::Template { message, .. } => Error::template_at(&source, message),
            other => other,
        })?;

        info!(
            path = %source,
            container = %template.primary_container_name(),
            "loaded job template"
        );
        Ok(template)
    }

    /// The parsed manifest
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// A fresh deep copy to derive a concrete Job from
    pub fn instantiate(&self) -> Job {
        self.job.clone()
    }

    /// Name of the container the agent runs in (the first one)
    pub fn primary_container_name(&self) -> &str {
        &self.primary_container_name
    }
}

/// Parse a Job manifest.
///
/// Resource quantities written as bare YAML numbers (`cpu: 2`) are turned
/// into strings first, since `Quantity` only deserializes from a string.
fn parse_job(yaml: &str) -> Result<Job, Error> {
    let mut value = parse_yaml(yaml).map_err(|e| Error::template(e.to_string()))?;
    stringify_quantities(&mut value);
    serde_json::from_value(value).map_err(|e| Error::serialization_for_kind("Job", e.to_string()))
}

fn stringify_quantities(job: &mut Value) {
    let Some(pod_spec) = job.pointer_mut("/spec/template/spec") else {
        return;
    };
    for list in ["containers", "initContainers"] {
        let Some(containers) = pod_spec.get_mut(list).and_then(Value::as_array_mut) else {
            continue;
        };
        for container in containers {
            for section in ["requests", "limits"] {
                let Some(quantities) = container
                    .pointer_mut(&format!("/resources/{section}"))
                    .and_then(Value::as_object_mut)
                else {
                    continue;
                };
                for quantity in quantities.values_mut() {
                    if quantity.is_number() {
                        *quantity = Value::String(quantity.to_string());
                    }
                }
            }
        }
    }
}

/// First container of the Job's pod template, if any.
pub fn primary_container(job: &Job) -> Option<&Container> {
    job.spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .first()
}

/// Mutable access to the first container of the Job's pod template.
pub fn primary_container_mut(job: &mut Job) -> Option<&mut Container> {
    job.spec
        .as_mut()?
        .template
        .spec
        .as_mut()?
        .containers
        .first_mut()
}
