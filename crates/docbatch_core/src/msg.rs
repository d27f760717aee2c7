use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Operator picked a destination folder.
    DestinationSelected(PathBuf),
    /// Operator switched between destructive and incremental mode.
    ModeSelected(crate::RunMode),
    /// Operator clicked Start.
    StartClicked,
    /// Validation pass finished; `clean` is false when warnings need confirmation.
    ValidationFinished { clean: bool },
    /// Operator clicked Continue after reviewing validation warnings.
    ContinueClicked,
    /// Operator clicked Cancel.
    CancelClicked,
    /// A line from the engine event stream.
    LogLine(String),
    /// Engine reported the end of the run.
    RunFinished(crate::RunSummary),
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
