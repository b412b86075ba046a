//! kubekite - runs a Kubernetes Job per queued Buildkite build

mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

use kubekite_common::events::KubeEventPublisher;
use kubekite_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use kubekite_common::{
    ManagerConfig, CONTROLLER_NAME, DEFAULT_AGENT_CONTAINER, DEFAULT_NAMESPACE,
};
use kubekite_job::cluster::kube_client;
use kubekite_job::{dispatch, JobManager, JobTemplate, KubeClusterClient, QueueEntry};

/// Launch a Kubernetes Job for every queued Buildkite build and delete it once
/// the agent has finished.
///
/// Queue entries are read from stdin, one JSON object per line:
/// `{"id": "...", "agent_query_rules": ["image=...", "cpu=2"]}`
#[derive(Parser, Debug)]
#[command(name = "kubekite", version, about, long_about = None)]
struct Cli {
    /// Path to the Job template YAML
    #[arg(long, env = "KUBEKITE_JOB_TEMPLATE", default_value = "job.yaml")]
    job_template: PathBuf,

    /// Path to a kubeconfig; the in-cluster config is used when omitted
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Namespace Jobs are launched into
    #[arg(long, env = "KUBEKITE_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// Connect and read timeout against the API server, in seconds
    #[arg(long, env = "KUBEKITE_KUBE_TIMEOUT", default_value_t = 15)]
    kube_timeout: u64,

    /// Buildkite organization slug
    #[arg(long, env = "BUILDKITE_ORG")]
    org: String,

    /// Buildkite pipeline slug
    #[arg(long, env = "BUILDKITE_PIPELINE")]
    pipeline: String,

    /// Seconds between two cleanup passes
    #[arg(long, env = "KUBEKITE_CLEANUP_INTERVAL", default_value_t = 15)]
    cleanup_interval: u64,

    /// Name of the agent container inside the Job's pod
    #[arg(long, env = "KUBEKITE_AGENT_CONTAINER", default_value = DEFAULT_AGENT_CONTAINER)]
    agent_container: String,

    /// Log output: json or text
    #[arg(long, env = "KUBEKITE_LOG_FORMAT", default_value = "json")]
    log_format: LogFormat,
}

impl Cli {
    fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            namespace: self.namespace.clone(),
            agent_container: self.agent_container.clone(),
            cleanup_interval: Duration::from_secs(self.cleanup_interval),
            ..ManagerConfig::new(&self.org, &self.pipeline)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        format: cli.log_format,
        filter: None,
    })?;

    let config = cli.manager_config();

    let template = match JobTemplate::load(&cli.job_template).await {
        Ok(template) => template,
        Err(e) => {
            error!(path = %cli.job_template.display(), error = %e, "Could not load job template");
            return Err(e.into());
        }
    };

    let client = kube_client(
        cli.kubeconfig.as_deref(),
        Some(Duration::from_secs(cli.kube_timeout)),
    )
    .await?;

    let shutdown = shutdown::install_shutdown_handler();

    let manager = JobManager::start(
        &config,
        template,
        Arc::new(KubeClusterClient::new(client.clone(), &config.namespace)),
        Arc::new(KubeEventPublisher::new(client, CONTROLLER_NAME)),
        &shutdown,
    )?;

    let entries = LinesStream::new(BufReader::new(tokio::io::stdin()).lines()).filter_map(
        |line| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => match QueueEntry::from_json(&line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed queue entry");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to read queue entry from stdin");
                None
            }
        },
    );

    dispatch(manager.launcher(), entries, &shutdown).await;

    info!(
        tracked = manager.registry().len().await,
        "Queue drained, cleaning up until shutdown"
    );
    shutdown.cancelled().await;

    manager.shutdown().await;
    Ok(())
}
