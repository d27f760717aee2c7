use std::path::PathBuf;

use crate::RunMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Validate the table and, when clean, run straight away.
    StartRun { destination: PathBuf, mode: RunMode },
    /// Operator acknowledged the validation warnings.
    ConfirmRun,
    /// Raise the cancellation signal of the current run.
    CancelRun,
    /// Store the operator preferences.
    PersistSettings { destination: Option<PathBuf>, mode: RunMode },
}
