//! Terminal front end: feeds operator and engine messages through the core
//! `update` function and carries out the effects it returns.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use docbatch_core::{
    update, AppState, Effect, ExistingMatch, Msg, RunStatus, RunSummary, SessionState, SourceTable,
};
use docbatch_engine::{EngineHandle, RunConfig, RunEvent};
use docbatch_logging::{engine_error, engine_info, engine_warn};

use crate::settings::{self, Preferences};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The engine operations the runner relies on.
pub trait RunEngine {
    fn start(&self, config: RunConfig, table: SourceTable);
    fn confirm(&self);
    fn cancel(&self);
    fn try_recv(&self) -> Result<RunEvent, mpsc::TryRecvError>;
    fn recv_timeout(&self, timeout: Duration) -> Result<RunEvent, mpsc::RecvTimeoutError>;
}

impl RunEngine for EngineHandle {
    fn start(&self, config: RunConfig, table: SourceTable) {
        EngineHandle::start(self, config, table);
    }

    fn confirm(&self) {
        EngineHandle::confirm(self);
    }

    fn cancel(&self) {
        EngineHandle::cancel(self);
    }

    fn try_recv(&self) -> Result<RunEvent, mpsc::TryRecvError> {
        EngineHandle::try_recv(self)
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<RunEvent, mpsc::RecvTimeoutError> {
        EngineHandle::recv_timeout(self, timeout)
    }
}

pub struct RunOptions {
    pub table: SourceTable,
    pub preferences: Preferences,
    pub settings_path: PathBuf,
    pub existing_match: ExistingMatch,
    pub assume_yes: bool,
}

pub struct Runner<E: RunEngine> {
    state: AppState,
    engine: E,
    options: RunOptions,
    msg_tx: mpsc::Sender<Msg>,
    msg_rx: mpsc::Receiver<Msg>,
    printed: usize,
    prompted: bool,
    summary: Option<RunSummary>,
}

impl<E: RunEngine> Runner<E> {
    pub fn new(engine: E, options: RunOptions) -> Self {
        let state = AppState::with_preferences(
            options.preferences.destination.clone(),
            options.preferences.mode(),
        );
        let (msg_tx, msg_rx) = mpsc::channel();
        Self {
            state,
            engine,
            options,
            msg_tx,
            msg_rx,
            printed: 0,
            prompted: false,
            summary: None,
        }
    }

    /// Sender for messages produced outside the loop (Ctrl-C, stdin).
    pub fn sender(&self) -> mpsc::Sender<Msg> {
        self.msg_tx.clone()
    }

    /// Apply an operator choice made before the run starts.
    pub fn select(&mut self, msg: Msg) {
        self.dispatch(msg);
    }

    /// Start the run and drive it to its summary. `None` when the run could
    /// not start at all.
    pub fn run(mut self) -> Option<RunSummary> {
        self.dispatch(Msg::StartClicked);
        if self.state.session() == SessionState::Idle {
            return None;
        }

        while self.summary.is_none() {
            self.drain_engine();
            while let Ok(msg) = self.msg_rx.try_recv() {
                self.dispatch(msg);
            }
            if self.state.session() == SessionState::AwaitingConfirmation && !self.prompted {
                self.prompted = true;
                self.ask_confirmation();
            }
            if self.summary.is_none() {
                match self.engine.recv_timeout(POLL_INTERVAL) {
                    Ok(event) => self.dispatch(event_to_msg(event)),
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Err(mpsc::RecvTimeoutError::Disconnected) => self.engine_lost(),
                }
            }
        }
        self.summary
    }

    fn drain_engine(&mut self) {
        loop {
            match self.engine.try_recv() {
                Ok(event) => self.dispatch(event_to_msg(event)),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    self.engine_lost();
                    break;
                }
            }
        }
    }

    /// The engine went away without a summary; end the run as failed.
    fn engine_lost(&mut self) {
        if self.summary.is_some() {
            return;
        }
        engine_error!("Engine stopped before the run finished");
        let summary = RunSummary::new(RunStatus::Failed("engine stopped unexpectedly".to_string()));
        self.dispatch(Msg::RunFinished(summary));
    }

    fn dispatch(&mut self, msg: Msg) {
        if let Msg::RunFinished(summary) = &msg {
            self.summary = Some(summary.clone());
        }
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        let dirty = state.consume_dirty();
        self.state = state;
        for effect in effects {
            self.apply(effect);
        }
        if dirty {
            self.print_new_lines();
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::StartRun { destination, mode } => {
                let config = RunConfig {
                    concurrency_bound: self.options.preferences.concurrency,
                    existing_match: self.options.existing_match,
                    ..RunConfig::new(destination, mode)
                };
                engine_info!("Starting run in {} mode", mode);
                self.engine.start(config, self.options.table.clone());
            }
            Effect::ConfirmRun => self.engine.confirm(),
            Effect::CancelRun => self.engine.cancel(),
            Effect::PersistSettings { destination, mode } => {
                self.options.preferences.destination = destination;
                self.options.preferences.set_mode(mode);
                if let Err(err) = settings::save(&self.options.settings_path, &self.options.preferences)
                {
                    engine_error!("Failed to save settings: {}", err);
                }
            }
        }
    }

    fn ask_confirmation(&self) {
        if self.options.assume_yes {
            let _ = self.msg_tx.send(Msg::ContinueClicked);
            return;
        }
        print!("Continue anyway? [y/N] ");
        let _ = io::stdout().flush();
        let tx = self.msg_tx.clone();
        // Blocking read off the loop so Ctrl-C still reaches the engine.
        thread::spawn(move || {
            let mut answer = String::new();
            let msg = match io::stdin().lock().read_line(&mut answer) {
                Ok(_) if is_yes(&answer) => Msg::ContinueClicked,
                Ok(_) => Msg::CancelClicked,
                Err(err) => {
                    engine_warn!("Could not read confirmation: {}", err);
                    Msg::CancelClicked
                }
            };
            let _ = tx.send(msg);
        });
    }

    fn print_new_lines(&mut self) {
        let log = self.state.log();
        if log.len() < self.printed {
            self.printed = 0;
        }
        for line in &log[self.printed..] {
            println!("{line}");
        }
        self.printed = log.len();
    }
}

pub fn event_to_msg(event: RunEvent) -> Msg {
    match event {
        RunEvent::Log(line) => Msg::LogLine(line),
        RunEvent::Validated(report) => Msg::ValidationFinished {
            clean: report.is_clean(),
        },
        // Session state already moved on `Validated`.
        RunEvent::AwaitingConfirmation => Msg::NoOp,
        RunEvent::Finished(summary) => Msg::RunFinished(summary),
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Forward Ctrl-C as a cancel request for as long as the process lives.
pub fn spawn_interrupt_listener(tx: mpsc::Sender<Msg>) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                engine_error!("Ctrl-C handling unavailable: {}", err);
                return;
            }
        };
        runtime.block_on(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if tx.send(Msg::CancelClicked).is_err() {
                    break;
                }
            }
        });
    });
}
