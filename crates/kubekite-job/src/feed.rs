//! Feeding queue entries into the launcher
//!
//! One bad entry never stops the feed: every failure is logged and counted,
//! and the next entry is processed.

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::entry::QueueEntry;
use crate::launcher::{JobLauncher, LaunchOutcome};

/// Counts of what a feed produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub launched: usize,
    pub existing: usize,
    pub failed: usize,
}

/// Launch every entry from `entries` until the stream ends or `cancel` fires.
pub async fn dispatch<S>(
    launcher: &JobLauncher,
    entries: S,
    cancel: &CancellationToken,
) -> DispatchSummary
where
    S: Stream<Item = QueueEntry>,
{
    let mut entries = std::pin::pin!(entries);
    let mut summary = DispatchSummary::default();

    loop {
        let entry = tokio::select! {
            _ = cancel.cancelled() => break,
            next = entries.next() => match next {
                Some(entry) => entry,
                None => break,
            },
        };

        match launcher.launch(&entry).await {
            Ok(LaunchOutcome::Created { .. }) => summary.launched += 1,
            Ok(LaunchOutcome::AlreadyExists { .. }) => summary.existing += 1,
            Err(e) => {
                warn!(
                    entry = %entry.id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Failed to launch job for queue entry"
                );
                summary.failed += 1;
            }
        }
    }

    info!(
        launched = summary.launched,
        existing = summary.existing,
        failed = summary.failed,
        "Queue feed finished"
    );
    summary
}
