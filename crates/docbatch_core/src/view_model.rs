use std::path::PathBuf;

use crate::{RunMode, RunSummary, SessionState};

/// Which operator controls are interactive in the current session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlsView {
    pub start_enabled: bool,
    pub continue_enabled: bool,
    pub cancel_enabled: bool,
    pub settings_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub session: SessionState,
    pub destination: Option<PathBuf>,
    pub mode: RunMode,
    pub controls: ControlsView,
    pub log_len: usize,
    pub last_summary: Option<RunSummary>,
    pub dirty: bool,
}
