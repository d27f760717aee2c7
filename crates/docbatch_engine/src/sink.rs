use std::sync::mpsc;

use docbatch_logging::{engine_info, engine_warn};

use crate::RunEvent;

pub trait EventSink: Send + Sync {
    fn emit(&self, event: RunEvent);

    /// Emit an operator-facing line and mirror it to the diagnostic log.
    fn line(&self, line: String) {
        engine_info!("{}", line);
        self.emit(RunEvent::Log(line));
    }

    /// Like [`EventSink::line`] for item and group failures.
    fn warn_line(&self, line: String) {
        engine_warn!("{}", line);
        self.emit(RunEvent::Log(line));
    }
}

/// Unbounded channel sink; sending never blocks the engine.
pub struct ChannelEventSink {
    tx: mpsc::Sender<RunEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<RunEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: RunEvent) {
        let _ = self.tx.send(event);
    }
}
