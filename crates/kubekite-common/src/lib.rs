//! Common types for kubekite: errors, configuration, labels, and utilities

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod events;
pub mod labels;
pub mod telemetry;
pub mod yaml;

pub use config::ManagerConfig;
pub use error::Error;
pub use labels::OwnershipLabels;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Label marking a Job (and its pods) as launched by kubekite
pub const MANAGED_LABEL_KEY: &str = "kubekite-managed";

/// Label carrying the Buildkite organization slug
pub const ORG_LABEL_KEY: &str = "kubekite-org";

/// Label carrying the Buildkite pipeline slug
pub const PIPELINE_LABEL_KEY: &str = "kubekite-pipeline";

/// Label the Job controller stamps on every pod it creates
pub const JOB_NAME_LABEL_KEY: &str = "job-name";

/// Environment variable holding the comma-joined agent query rules
pub const AGENT_TAGS_ENV_VAR: &str = "BUILDKITE_AGENT_TAGS";

/// Name of the container running the Buildkite agent
pub const DEFAULT_AGENT_CONTAINER: &str = "buildkite-agent";

/// Prefix prepended to the queue entry identifier to form the Job name
pub const DEFAULT_JOB_NAME_PREFIX: &str = "buildkite-agent-";

/// Default namespace for launched Jobs
pub const DEFAULT_NAMESPACE: &str = "default";

/// Default pause between two cleanup passes
pub const DEFAULT_CLEANUP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(15);

/// Field manager / reporting component name used against the Kubernetes API
pub const CONTROLLER_NAME: &str = "kubekite-job-manager";
