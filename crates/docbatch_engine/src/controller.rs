use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use docbatch_core::{
    validate, ExistingMatch, Group, RunMode, RunStatus, RunSummary, SourceTable,
    ValidationReport,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::fetch::Fetcher;
use crate::merge::{plan_merge, run_merge, DocumentMerger, MergeError};
use crate::persist::{ensure_output_dir, PersistError};
use crate::planner::{GroupPlanner, PlanError};
use crate::pool::{run_pool, PoolReport, DEFAULT_CONCURRENCY};
use crate::sink::EventSink;
use crate::{FetchError, RunEvent};

/// Supplies the `YYYY-MM-DD` stamp of incremental compiled outputs.
pub type DateFn = Arc<dyn Fn() -> String + Send + Sync>;

pub fn local_date() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// Immutable per-run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub destination_root: PathBuf,
    pub mode: RunMode,
    pub concurrency_bound: usize,
    pub existing_match: ExistingMatch,
}

impl RunConfig {
    pub fn new(destination_root: impl Into<PathBuf>, mode: RunMode) -> Self {
        Self {
            destination_root: destination_root.into(),
            mode,
            concurrency_bound: DEFAULT_CONCURRENCY,
            existing_match: ExistingMatch::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("could not open the remote session: {0}")]
    Connectivity(#[source] FetchError),
    #[error("destination {path} is unusable: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: PersistError,
    },
}

/// Failure confined to one group; the run moves on to the next group.
#[derive(Debug, Error)]
pub enum GroupError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("could not create group folder: {0}")]
    Folder(#[from] PersistError),
    #[error(transparent)]
    Merge(#[from] MergeError),
}

/// Mutable state of one run, passed by reference to every stage.
#[derive(Debug)]
pub struct RunContext {
    pub cancel: CancellationToken,
    started: Instant,
    total_downloaded: usize,
    ignored_items: Vec<String>,
    failed_items: Vec<String>,
}

impl RunContext {
    pub fn new(cancel: CancellationToken, started: Instant) -> Self {
        Self {
            cancel,
            started,
            total_downloaded: 0,
            ignored_items: Vec::new(),
            failed_items: Vec::new(),
        }
    }

    fn into_summary(self, status: RunStatus) -> RunSummary {
        RunSummary {
            status,
            total_downloaded: self.total_downloaded,
            elapsed: self.started.elapsed(),
            ignored_items: self.ignored_items,
            failed_items: self.failed_items,
        }
    }
}

/// Sequences validation and the per-group plan, fetch and merge stages.
pub struct RunController {
    fetcher: Arc<dyn Fetcher>,
    merger: Arc<dyn DocumentMerger>,
    extension: String,
    today: DateFn,
}

impl RunController {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        merger: Arc<dyn DocumentMerger>,
        extension: impl Into<String>,
        today: DateFn,
    ) -> Self {
        Self {
            fetcher,
            merger,
            extension: extension.into(),
            today,
        }
    }

    /// Validation pass; reports every warning line and the report itself.
    pub fn validate(&self, table: &SourceTable, sink: &dyn EventSink) -> ValidationReport {
        sink.line("Validating the source table...".to_string());
        let report = validate(table);
        if report.is_clean() {
            sink.line("No problems found in the table. Starting...".to_string());
        } else {
            sink.line("ATTENTION: check the following problems in the table:".to_string());
            for warning in &report.warnings {
                sink.warn_line(format!("WARNING: {}", warning.message));
            }
            sink.line(
                "If this is correct, continue. Otherwise fix the table and start again."
                    .to_string(),
            );
        }
        sink.emit(RunEvent::Validated(report.clone()));
        report
    }

    /// Run every group of `table` in column order. Always returns a summary;
    /// run-level failures are reported through its status.
    pub async fn execute(
        &self,
        config: &RunConfig,
        table: &SourceTable,
        mut ctx: RunContext,
        sink: &dyn EventSink,
    ) -> RunSummary {
        let status = match self.execute_groups(config, table, &mut ctx, sink).await {
            Ok(()) if ctx.cancel.is_cancelled() => RunStatus::Cancelled,
            Ok(()) => RunStatus::Completed,
            Err(err) => {
                sink.warn_line(format!("GENERAL ERROR: {err}"));
                RunStatus::Failed(err.to_string())
            }
        };
        ctx.into_summary(status)
    }

    async fn execute_groups(
        &self,
        config: &RunConfig,
        table: &SourceTable,
        ctx: &mut RunContext,
        sink: &dyn EventSink,
    ) -> Result<(), RunError> {
        if ctx.cancel.is_cancelled() {
            return Ok(());
        }
        ensure_output_dir(&config.destination_root).map_err(|source| RunError::Destination {
            path: config.destination_root.clone(),
            source,
        })?;

        sink.line("Starting web session...".to_string());
        self.fetcher
            .warm_up()
            .await
            .map_err(RunError::Connectivity)?;
        sink.line("Session started.".to_string());

        match config.mode {
            RunMode::Destructive => sink.line("Destructive mode enabled.".to_string()),
            RunMode::Incremental => sink.line("Incremental mode enabled.".to_string()),
        }

        let mut planner = GroupPlanner::new(
            config.destination_root.clone(),
            config.mode,
            config.existing_match,
        );
        for group in table.groups() {
            if ctx.cancel.is_cancelled() {
                sink.line("Run interrupted by the operator.".to_string());
                break;
            }
            sink.line(format!("--- Processing group: {} ---", group.name));
            if let Err(err) = self
                .process_group(config, table, &group, &mut planner, ctx, sink)
                .await
            {
                sink.warn_line(format!("ERROR in group {}: {err}", group.name));
            }
        }
        Ok(())
    }

    async fn process_group(
        &self,
        config: &RunConfig,
        table: &SourceTable,
        group: &Group,
        planner: &mut GroupPlanner,
        ctx: &mut RunContext,
        sink: &dyn EventSink,
    ) -> Result<(), GroupError> {
        let plan = planner.plan(table, group, &ctx.cancel)?;
        ctx.ignored_items.extend(plan.ignored.iter().cloned());

        if plan.inspected_existing {
            sink.line(format!(
                "-> {} files already exist. {} new downloads needed.",
                plan.already_present,
                plan.tasks.len()
            ));
        }

        let mut newly_fetched = Vec::new();
        if plan.tasks.is_empty() {
            if plan.valid_count > 0 {
                sink.line("No new downloads. Skipping.".to_string());
            } else {
                sink.line("No valid items in the list.".to_string());
            }
        } else {
            ensure_output_dir(&plan.folder)?;
            let requested = plan.tasks.len();
            sink.line(format!("Downloading {requested} items for {}...", group.name));
            let outcomes = run_pool(
                self.fetcher.as_ref(),
                plan.tasks,
                config.concurrency_bound,
                &ctx.cancel,
                sink,
            )
            .await;
            let report = PoolReport::from_outcomes(&outcomes);
            ctx.total_downloaded += report.downloaded.len();
            ctx.failed_items.extend(report.failed);
            if !report.downloaded.is_empty() {
                sink.line(format!(
                    "-> Success: {} of {requested} items downloaded.",
                    report.downloaded.len()
                ));
            }
            newly_fetched = report.downloaded;
        }

        if ctx.cancel.is_cancelled() {
            sink.line(format!("Merge cancelled for {}.", group.name));
            return Ok(());
        }
        self.merge_group(config.mode, &plan.group, &plan.folder, &newly_fetched, ctx, sink)?;
        Ok(())
    }

    fn merge_group(
        &self,
        mode: RunMode,
        group: &Group,
        folder: &std::path::Path,
        newly_fetched: &[PathBuf],
        ctx: &RunContext,
        sink: &dyn EventSink,
    ) -> Result<Option<PathBuf>, MergeError> {
        let date = (self.today)();
        match plan_merge(group, folder, mode, newly_fetched, &date, &self.extension)? {
            Some(job) => run_merge(&job, self.merger.as_ref(), &ctx.cancel, sink),
            None => {
                let line = match mode {
                    RunMode::Destructive => format!("No files to compile for {}.", group.name),
                    RunMode::Incremental => {
                        format!("No new files to compile for {}.", group.name)
                    }
                };
                sink.line(line);
                Ok(None)
            }
        }
    }
}
