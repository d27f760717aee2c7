use std::fmt;
use std::path::PathBuf;

use docbatch_core::{Group, ItemId, RunSummary, ValidationReport};

/// One item slated for fetch into a group folder. Consumed exactly once by the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub item_id: ItemId,
    pub group: Group,
    pub target_folder: PathBuf,
}

/// Result of one [`DownloadTask`]; produced exactly once per task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Success { item_id: ItemId, path: PathBuf },
    Error { item_id: ItemId, error: FetchError },
    Cancelled { item_id: ItemId },
}

impl DownloadOutcome {
    pub fn item_id(&self) -> &ItemId {
        match self {
            DownloadOutcome::Success { item_id, .. }
            | DownloadOutcome::Error { item_id, .. }
            | DownloadOutcome::Cancelled { item_id } => item_id,
        }
    }
}

/// Everything the operator-facing layer is told about a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// Human-readable progress line, in production order.
    Log(String),
    /// Validation pass result for the started run.
    Validated(ValidationReport),
    /// Validation produced warnings; the run waits for confirm or cancel.
    AwaitingConfirmation,
    /// Terminal event of every started run.
    Finished(RunSummary),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    Network,
    Io,
    NotPersisted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Io => write!(f, "io error"),
            FailureKind::NotPersisted => write!(f, "file was not saved to disk"),
        }
    }
}
