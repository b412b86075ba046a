//! Job manager configuration

use std::time::Duration;

use crate::labels::OwnershipLabels;
use crate::{
    Error, AGENT_TAGS_ENV_VAR, DEFAULT_AGENT_CONTAINER, DEFAULT_CLEANUP_INTERVAL,
    DEFAULT_JOB_NAME_PREFIX, DEFAULT_NAMESPACE,
};

/// Settings shared by the launcher and the cleanup loop.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Namespace Jobs are created in and pods are listed from
    pub namespace: String,
    /// Buildkite organization slug, stamped as a label
    pub org: String,
    /// Buildkite pipeline slug, stamped as a label
    pub pipeline: String,
    /// Name of the container whose termination ends the Job
    pub agent_container: String,
    /// Prefix of every derived Job name
    pub job_name_prefix: String,
    /// Environment variable receiving the comma-joined query rules
    pub tags_env_var: String,
    /// Pause between two cleanup passes
    pub cleanup_interval: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            org: String::new(),
            pipeline: String::new(),
            agent_container: DEFAULT_AGENT_CONTAINER.to_string(),
            job_name_prefix: DEFAULT_JOB_NAME_PREFIX.to_string(),
            tags_env_var: AGENT_TAGS_ENV_VAR.to_string(),
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl ManagerConfig {
    /// Config for an organization and pipeline, everything else defaulted
    pub fn new(org: impl Into<String>, pipeline: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            pipeline: pipeline.into(),
            ..Default::default()
        }
    }

    /// Ownership labels derived from org and pipeline
    pub fn ownership(&self) -> OwnershipLabels {
        OwnershipLabels::new(&self.org, &self.pipeline)
    }

    /// Reject settings that would produce unselectable or unnamed Jobs
    pub fn validate(&self) -> Result<(), Error> {
        for (field, value) in [
            ("namespace", &self.namespace),
            ("org", &self.org),
            ("pipeline", &self.pipeline),
            ("agent_container", &self.agent_container),
            ("tags_env_var", &self.tags_env_var),
        ] {
            if value.trim().is_empty() {
                return Err(Error::config(field, "must not be empty"));
            }
        }

        // Label values: alphanumerics plus '-', '_' and '.', at most 63 chars,
        // starting and ending with an alphanumeric
        for (field, value) in [("org", &self.org), ("pipeline", &self.pipeline)] {
            let valid = value.len() <= 63
                && value
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
                && value.starts_with(|c: char| c.is_ascii_alphanumeric())
                && value.ends_with(|c: char| c.is_ascii_alphanumeric());
            if !valid {
                return Err(Error::config(
                    field,
                    format!("'{}' is not a valid label value", value),
                ));
            }
        }

        if self.cleanup_interval.is_zero() {
            return Err(Error::config("cleanup_interval", "must be greater than zero"));
        }

        Ok(())
    }
}
