use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use docbatch_core::{RunStatus, RunSummary, SourceTable};
use docbatch_logging::{engine_error, engine_info};
use tokio_util::sync::CancellationToken;

use crate::controller::{local_date, DateFn, RunConfig, RunContext, RunController};
use crate::fetch::{FetchSettings, Fetcher, ReqwestFetcher};
use crate::merge::{DocumentMerger, LopdfMerger};
use crate::sink::{ChannelEventSink, EventSink};
use crate::{FetchError, RunEvent};

enum EngineCommand {
    Start {
        config: RunConfig,
        table: SourceTable,
        cancel: CancellationToken,
    },
    Confirm,
    Discard,
}

/// A run that passed validation with warnings and waits for the operator.
struct PendingRun {
    config: RunConfig,
    table: SourceTable,
    cancel: CancellationToken,
    started: Instant,
}

/// Handle to the engine thread. Runs are started, confirmed and cancelled
/// through it; progress comes back as [`RunEvent`]s.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<RunEvent>,
    cancel: Arc<Mutex<CancellationToken>>,
}

impl EngineHandle {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let extension = settings.file_extension.clone();
        let fetcher = Arc::new(ReqwestFetcher::new(settings)?);
        Ok(Self::with_components(
            fetcher,
            Arc::new(LopdfMerger),
            extension,
            Arc::new(local_date),
        ))
    }

    pub fn with_components(
        fetcher: Arc<dyn Fetcher>,
        merger: Arc<dyn DocumentMerger>,
        extension: impl Into<String>,
        today: DateFn,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let cancel = Arc::new(Mutex::new(CancellationToken::new()));
        let controller = RunController::new(fetcher, merger, extension, today);

        thread::spawn(move || {
            let sink = ChannelEventSink::new(event_tx);
            engine_loop(&controller, cmd_rx, &sink);
        });

        Self {
            cmd_tx,
            event_rx,
            cancel,
        }
    }

    /// Start a run: validate, then execute directly when the table is clean.
    pub fn start(&self, config: RunConfig, table: SourceTable) {
        // A fresh run gets a fresh, uncancelled signal.
        let cancel = CancellationToken::new();
        if let Ok(mut current) = self.cancel.lock() {
            *current = cancel.clone();
        }
        let _ = self.cmd_tx.send(EngineCommand::Start {
            config,
            table,
            cancel,
        });
    }

    /// Continue a run held back by validation warnings.
    pub fn confirm(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Confirm);
    }

    /// Raise the cancellation signal of the current run. A run still waiting
    /// for confirmation is discarded.
    pub fn cancel(&self) {
        if let Ok(token) = self.cancel.lock() {
            token.cancel();
        }
        let _ = self.cmd_tx.send(EngineCommand::Discard);
    }

    /// Next pending event. `Disconnected` means the engine thread is gone.
    pub fn try_recv(&self) -> Result<RunEvent, mpsc::TryRecvError> {
        self.event_rx.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<RunEvent, mpsc::RecvTimeoutError> {
        self.event_rx.recv_timeout(timeout)
    }
}

fn engine_loop(
    controller: &RunController,
    cmd_rx: mpsc::Receiver<EngineCommand>,
    sink: &dyn EventSink,
) {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => Some(runtime),
        Err(err) => {
            engine_error!("Could not start the async runtime: {}", err);
            None
        }
    };
    let mut pending: Option<PendingRun> = None;

    while let Ok(command) = cmd_rx.recv() {
        match command {
            EngineCommand::Start {
                config,
                table,
                cancel,
            } => {
                if let Some(stale) = pending.take() {
                    finish(sink, cancelled_summary(stale.started));
                }
                let run = PendingRun {
                    config,
                    table,
                    cancel,
                    started: Instant::now(),
                };
                let report = controller.validate(&run.table, sink);
                if report.is_clean() {
                    execute(controller, runtime.as_ref(), run, sink);
                } else {
                    sink.emit(RunEvent::AwaitingConfirmation);
                    pending = Some(run);
                }
            }
            EngineCommand::Confirm => {
                if let Some(run) = pending.take() {
                    sink.line("Continuing with the downloads...".to_string());
                    execute(controller, runtime.as_ref(), run, sink);
                }
            }
            EngineCommand::Discard => {
                if let Some(run) = pending.take() {
                    finish(sink, cancelled_summary(run.started));
                }
            }
        }
    }
    engine_info!("Engine command channel closed; stopping.");
}

fn execute(
    controller: &RunController,
    runtime: Option<&tokio::runtime::Runtime>,
    run: PendingRun,
    sink: &dyn EventSink,
) {
    let started = run.started;
    let summary = match runtime {
        Some(runtime) => {
            let ctx = RunContext::new(run.cancel, run.started);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                runtime.block_on(controller.execute(&run.config, &run.table, ctx, sink))
            }));
            outcome.unwrap_or_else(|_| failed_summary(started, "internal error"))
        }
        None => failed_summary(started, "async runtime unavailable"),
    };
    // The operator always gets control back, whatever happened above.
    finish(sink, summary);
}

fn failed_summary(started: Instant, reason: &str) -> RunSummary {
    let mut summary = RunSummary::new(RunStatus::Failed(reason.to_string()));
    summary.elapsed = started.elapsed();
    summary
}

fn cancelled_summary(started: Instant) -> RunSummary {
    let mut summary = RunSummary::new(RunStatus::Cancelled);
    summary.elapsed = started.elapsed();
    summary
}

fn finish(sink: &dyn EventSink, summary: RunSummary) {
    for line in summary.lines() {
        engine_info!("{}", line);
    }
    sink.emit(RunEvent::Finished(summary));
}
