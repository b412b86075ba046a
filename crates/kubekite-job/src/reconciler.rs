//! Completed-job cleaner
//!
//! Every cycle lists the pods carrying our ownership labels, and for each pod
//! whose agent container has terminated deletes the owning Job with foreground
//! propagation, so the pod goes away before the Job does. Cluster labels are
//! the only input: a restarted process still finds Jobs launched before it.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::{ContainerStateTerminated, Pod};
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use kubekite_common::events::{actions, reasons, EventPublisher};
use kubekite_common::{ManagerConfig, JOB_NAME_LABEL_KEY};

use crate::cluster::{ClusterClient, DeletePropagation};

/// Result of one cleanup cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Pods matched by the ownership selector
    pub pods: usize,
    /// Jobs a delete was issued for
    pub deleted: Vec<String>,
    /// Jobs whose delete failed
    pub failed: Vec<String>,
    /// Listing pods failed and the cycle was abandoned
    pub list_failed: bool,
}

pub struct Reconciler {
    client: Arc<dyn ClusterClient>,
    events: Arc<dyn EventPublisher>,
    selector: String,
    agent_container: String,
    interval: Duration,
}

impl Reconciler {
    pub fn new(
        config: &ManagerConfig,
        client: Arc<dyn ClusterClient>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            client,
            events,
            selector: config.ownership().selector(),
            agent_container: config.agent_container.clone(),
            interval: config.cleanup_interval,
        }
    }

    /// Run one cleanup cycle.
    ///
    /// Errors never escape: a failed list ends the cycle, a failed delete is
    /// recorded and the remaining pods are still processed.
    pub async fn reconcile_once(&self) -> CycleReport {
        debug!(selector = %self.selector, "Cleaning completed jobs");

        let pods = match self.client.list_pods(&self.selector).await {
            Ok(pods) => pods,
            Err(e) => {
                error!(error = %e, "Could not list pods");
                return CycleReport {
                    list_failed: true,
                    ..Default::default()
                };
            }
        };

        let mut report = CycleReport {
            pods: pods.len(),
            ..Default::default()
        };
        let mut handled = BTreeSet::new();

        for pod in &pods {
            if pod.metadata.deletion_timestamp.is_some() {
                continue;
            }
            let Some(terminated) = agent_terminated(pod, &self.agent_container) else {
                continue;
            };
            let Some(job_name) = owning_job(pod) else {
                warn!(
                    pod = %pod.name_any(),
                    "Agent terminated but pod has no {} label",
                    JOB_NAME_LABEL_KEY
                );
                continue;
            };
            if !handled.insert(job_name.to_string()) {
                continue;
            }

            info!(job = %job_name, exit_code = terminated.exit_code, "Deleting job");
            self.publish_completed(pod, job_name, terminated).await;

            match self
                .client
                .delete_job(job_name, DeletePropagation::Foreground)
                .await
            {
                Ok(()) => report.deleted.push(job_name.to_string()),
                Err(e) if e.is_not_found() => {
                    debug!(job = %job_name, "Job already deleted");
                }
                Err(e) => {
                    error!(job = %job_name, error = %e, "Error deleting job");
                    report.failed.push(job_name.to_string());
                }
            }
        }

        report
    }

    /// Clean up every `interval` until `cancel` fires.
    ///
    /// Cancellation is checked before each cycle and during the sleep; a cycle
    /// already in flight runs to completion.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            selector = %self.selector,
            interval_secs = self.interval.as_secs_f64(),
            "Kube job cleaner started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let report = self.reconcile_once().await;
            debug!(
                pods = report.pods,
                deleted = report.deleted.len(),
                failed = report.failed.len(),
                list_failed = report.list_failed,
                "Cleanup cycle finished"
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Kube job cleaner stopped");
    }

    /// Run the loop on a background task
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn publish_completed(&self, pod: &Pod, job_name: &str, state: &ContainerStateTerminated) {
        let type_ = if state.exit_code == 0 {
            EventType::Normal
        } else {
            EventType::Warning
        };
        let note = format!(
            "Agent container {} exited with code {}; deleting job {}",
            self.agent_container, state.exit_code, job_name
        );
        self.events
            .publish(
                &pod.object_ref(&()),
                type_,
                reasons::AGENT_COMPLETED,
                actions::CLEANUP,
                Some(note),
            )
            .await;
    }
}

/// Terminated state of the named container, if it has terminated
pub fn agent_terminated<'a>(pod: &'a Pod, container: &str) -> Option<&'a ContainerStateTerminated> {
    pod.status
        .as_ref()?
        .container_statuses
        .as_ref()?
        .iter()
        .find(|status| status.name == container)?
        .state
        .as_ref()?
        .terminated
        .as_ref()
}

/// Name of the Job that owns this pod, from the Job controller's label
pub fn owning_job(pod: &Pod) -> Option<&str> {
    pod.labels()
        .get(JOB_NAME_LABEL_KEY)
        .map(String::as_str)
        .filter(|name| !name.is_empty())
}
