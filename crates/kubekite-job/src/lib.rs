//! Job lifecycle engine for Buildkite agents on Kubernetes
//!
//! Turns queued Buildkite jobs into Kubernetes Jobs and reaps them once the
//! agent container exits:
//! - `parameterizer` derives a concrete Job from the template and query rules
//! - `launcher` creates at most one Job per queue entry
//! - `reconciler` deletes Jobs whose agent has terminated (foreground cascade)
//! - `manager` wires both together for the lifetime of the process

pub mod cluster;
pub mod entry;
pub mod error;
pub mod feed;
pub mod launcher;
pub mod manager;
pub mod parameterizer;
pub mod quantity;
pub mod reconciler;
pub mod registry;
pub mod rules;
pub mod template;

pub use cluster::{ClusterClient, DeletePropagation, KubeClusterClient};
pub use entry::QueueEntry;
pub use error::JobError;
pub use feed::{dispatch, DispatchSummary};
pub use launcher::{JobLauncher, LaunchOutcome};
pub use manager::JobManager;
pub use parameterizer::Parameterizer;
pub use reconciler::{CycleReport, Reconciler};
pub use registry::JobRegistry;
pub use template::JobTemplate;
