//! Process-lifetime owner of the launcher and the cleanup task

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use kubekite_common::events::EventPublisher;
use kubekite_common::ManagerConfig;

use crate::cluster::ClusterClient;
use crate::entry::QueueEntry;
use crate::error::JobError;
use crate::launcher::{JobLauncher, LaunchOutcome};
use crate::reconciler::Reconciler;
use crate::registry::JobRegistry;
use crate::template::JobTemplate;

/// Launches Jobs on request and keeps the cleaner running in the background.
pub struct JobManager {
    launcher: JobLauncher,
    cancel: CancellationToken,
    cleaner: JoinHandle<()>,
}

impl JobManager {
    /// Validate `config`, build the launcher and spawn the cleaner.
    ///
    /// The cleaner stops when `cancel` (or [`JobManager::shutdown`]) fires.
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: &ManagerConfig,
        template: JobTemplate,
        client: Arc<dyn ClusterClient>,
        events: Arc<dyn EventPublisher>,
        cancel: &CancellationToken,
    ) -> Result<Self, JobError> {
        config.validate()?;

        let launcher = JobLauncher::new(
            config,
            Arc::new(template),
            client.clone(),
            Arc::new(JobRegistry::new()),
            events.clone(),
        );

        let cancel = cancel.child_token();
        let cleaner = Arc::new(Reconciler::new(config, client, events)).spawn(cancel.clone());

        info!(
            namespace = %config.namespace,
            org = %config.org,
            pipeline = %config.pipeline,
            "Job manager started"
        );

        Ok(Self {
            launcher,
            cancel,
            cleaner,
        })
    }

    pub async fn launch(&self, entry: &QueueEntry) -> Result<LaunchOutcome, JobError> {
        self.launcher.launch(entry).await
    }

    pub fn launcher(&self) -> &JobLauncher {
        &self.launcher
    }

    pub fn registry(&self) -> &JobRegistry {
        self.launcher.registry()
    }

    /// Token the cleaner watches; cancel it to stop the cleaner
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stop the cleaner and wait for its current cycle to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.cleaner.await {
            warn!(error = %e, "Job cleaner task ended abnormally");
        }
        info!("Job manager stopped");
    }
}
