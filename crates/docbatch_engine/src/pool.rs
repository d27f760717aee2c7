use std::path::PathBuf;

use futures_util::{stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::fetch::Fetcher;
use crate::sink::EventSink;
use crate::{DownloadOutcome, DownloadTask};

/// Default upper bound of concurrently running downloads.
pub const DEFAULT_CONCURRENCY: usize = 15;

/// Outcomes of one group batch, split by variant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PoolReport {
    pub downloaded: Vec<PathBuf>,
    pub failed: Vec<String>,
    pub cancelled: usize,
}

impl PoolReport {
    pub fn from_outcomes(outcomes: &[DownloadOutcome]) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            match outcome {
                DownloadOutcome::Success { path, .. } => report.downloaded.push(path.clone()),
                DownloadOutcome::Error { item_id, .. } => report.failed.push(item_id.to_string()),
                DownloadOutcome::Cancelled { .. } => report.cancelled += 1,
            }
        }
        report
    }
}

/// Run every task with at most `bound` in flight and return one outcome per task,
/// in completion order.
///
/// Tasks not yet started when `cancel` fires yield `Cancelled` without touching
/// the network.
pub async fn run_pool(
    fetcher: &dyn Fetcher,
    tasks: Vec<DownloadTask>,
    bound: usize,
    cancel: &CancellationToken,
    sink: &dyn EventSink,
) -> Vec<DownloadOutcome> {
    let mut outcomes = Vec::with_capacity(tasks.len());
    let mut in_flight = stream::iter(tasks)
        .map(|task| async move {
            if cancel.is_cancelled() {
                return DownloadOutcome::Cancelled {
                    item_id: task.item_id,
                };
            }
            fetcher.download(&task, cancel).await
        })
        .buffer_unordered(bound.max(1));

    while let Some(outcome) = in_flight.next().await {
        if let DownloadOutcome::Error { item_id, error } = &outcome {
            sink.warn_line(format!("ERROR downloading item {item_id}. Cause: {error}"));
        }
        outcomes.push(outcome);
    }
    outcomes
}
