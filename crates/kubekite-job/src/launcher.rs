//! Launches at most one Job per queue entry
//!
//! Derive → look up by name → record in the registry → create. The lookup and
//! the create are not atomic: two concurrent launches for the same id can both
//! pass the lookup, and the API server's name uniqueness rejects the second
//! create. Callers are expected not to submit the same id concurrently.

use std::sync::Arc;

use k8s_openapi::api::batch::v1::Job;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tracing::{error, info, instrument};

use kubekite_common::events::{actions, reasons, EventPublisher};
use kubekite_common::ManagerConfig;

use crate::cluster::ClusterClient;
use crate::entry::QueueEntry;
use crate::error::JobError;
use crate::parameterizer::Parameterizer;
use crate::registry::JobRegistry;
use crate::template::JobTemplate;

/// What a launch call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// A new Job was created
    Created { name: String },
    /// A Job with the derived name already existed; nothing was done
    AlreadyExists { name: String },
}

impl LaunchOutcome {
    pub fn name(&self) -> &str {
        match self {
            LaunchOutcome::Created { name } | LaunchOutcome::AlreadyExists { name } => name,
        }
    }
}

pub struct JobLauncher {
    client: Arc<dyn ClusterClient>,
    template: Arc<JobTemplate>,
    parameterizer: Parameterizer,
    registry: Arc<JobRegistry>,
    events: Arc<dyn EventPublisher>,
}

impl JobLauncher {
    pub fn new(
        config: &ManagerConfig,
        template: Arc<JobTemplate>,
        client: Arc<dyn ClusterClient>,
        registry: Arc<JobRegistry>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            client,
            template,
            parameterizer: Parameterizer::new(config),
            registry,
            events,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Bring exactly one Job into existence for `entry`.
    ///
    /// A failed lookup or create is returned to the caller; the registry keeps
    /// whatever was recorded before the failure.
    #[instrument(skip(self, entry), fields(entry = %entry.id))]
    pub async fn launch(&self, entry: &QueueEntry) -> Result<LaunchOutcome, JobError> {
        let job = self.parameterizer.derive(&self.template, entry)?;
        let name = job.name_any();

        let existing = self
            .client
            .get_job(&name)
            .await
            .map_err(|source| JobError::Lookup {
                name: name.clone(),
                source,
            })?;
        if existing.is_some() {
            info!(job = %name, "Job already exists, not launching");
            return Ok(LaunchOutcome::AlreadyExists { name });
        }

        let mut registry = self.registry.lock().await;
        registry.record(&entry.id, job.clone());

        match self.client.create_job(&job).await {
            Ok(created) => {
                registry.record(&entry.id, created.clone());
                drop(registry);

                info!(job = %name, "Launched job");
                self.publish(
                    &created,
                    EventType::Normal,
                    reasons::JOB_LAUNCHED,
                    format!("Launched agent for Buildkite job {}", entry.id),
                )
                .await;
                Ok(LaunchOutcome::Created { name })
            }
            Err(source) => {
                drop(registry);

                error!(job = %name, error = %source, "Could not launch job");
                self.publish(
                    &job,
                    EventType::Warning,
                    reasons::LAUNCH_FAILED,
                    source.to_string(),
                )
                .await;
                Err(JobError::Create { name, source })
            }
        }
    }

    async fn publish(&self, job: &Job, type_: EventType, reason: &str, note: String) {
        self.events
            .publish(&job.object_ref(&()), type_, reason, actions::LAUNCH, Some(note))
            .await;
    }
}
