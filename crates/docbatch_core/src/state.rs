use std::path::{Path, PathBuf};

use crate::view_model::{AppViewModel, ControlsView};
use crate::{RunMode, RunSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Validating,
    AwaitingConfirmation,
    Running,
    Cancelling,
}

/// Operator-side session: preferences, run lifecycle and the visible log.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    session: SessionState,
    destination: Option<PathBuf>,
    mode: RunMode,
    log: Vec<String>,
    last_summary: Option<RunSummary>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preferences(destination: Option<PathBuf>, mode: RunMode) -> Self {
        Self {
            destination,
            mode,
            ..Self::default()
        }
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            session: self.session,
            destination: self.destination.clone(),
            mode: self.mode,
            controls: self.controls(),
            log_len: self.log.len(),
            last_summary: self.last_summary.clone(),
            dirty: self.dirty,
        }
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// Returns whether the state changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn controls(&self) -> ControlsView {
        let idle = self.session == SessionState::Idle;
        ControlsView {
            start_enabled: idle && self.destination.is_some(),
            continue_enabled: self.session == SessionState::AwaitingConfirmation,
            cancel_enabled: matches!(
                self.session,
                SessionState::Validating | SessionState::AwaitingConfirmation | SessionState::Running
            ),
            settings_enabled: idle,
        }
    }

    pub(crate) fn set_session(&mut self, session: SessionState) {
        if self.session != session {
            self.session = session;
            self.dirty = true;
        }
    }

    pub(crate) fn set_destination(&mut self, destination: PathBuf) {
        self.destination = Some(destination);
        self.dirty = true;
    }

    pub(crate) fn set_mode(&mut self, mode: RunMode) {
        self.mode = mode;
        self.dirty = true;
    }

    pub(crate) fn clear_log(&mut self) {
        self.log.clear();
        self.dirty = true;
    }

    pub(crate) fn push_log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
        self.dirty = true;
    }

    pub(crate) fn finish(&mut self, summary: RunSummary) {
        self.log.extend(summary.lines());
        self.last_summary = Some(summary);
        self.session = SessionState::Idle;
        self.dirty = true;
    }
}
