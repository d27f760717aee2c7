mod runner;
mod settings;
mod table_loader;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use docbatch_core::{ExistingMatch, Msg, RunMode, RunStatus};
use docbatch_engine::{EngineHandle, FetchSettings};
use docbatch_logging::{engine_info, LogDestination};
use log::LevelFilter;

use runner::{RunOptions, Runner};

#[derive(Parser)]
#[command(name = "docbatch")]
#[command(about = "Fetch documents listed in a table into per-group folders and compile them")]
#[command(version)]
struct Cli {
    /// CSV table: the first row names the groups, each column lists item ids.
    #[arg(long)]
    table: PathBuf,

    /// Destination root folder; remembered for later runs.
    #[arg(long)]
    dest: Option<PathBuf>,

    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Maximum number of concurrent downloads.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Treat an item as present only when a file stem equals its id.
    #[arg(long)]
    exact_match: bool,

    /// Continue past validation warnings without asking.
    #[arg(long, short = 'y')]
    yes: bool,

    #[arg(long, default_value = settings::SETTINGS_FILENAME)]
    settings: PathBuf,

    /// Override the document endpoint.
    #[arg(long)]
    endpoint: Option<String>,

    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Incremental,
    Destructive,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Incremental => RunMode::Incremental,
            ModeArg::Destructive => RunMode::Destructive,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    docbatch_logging::initialize(LogDestination::File, level, Path::new("./docbatch.log"));
    engine_info!("docbatch starting");

    let table = table_loader::load_table(&cli.table)
        .with_context(|| format!("loading {}", cli.table.display()))?;

    let mut preferences = settings::load(&cli.settings);
    if let Some(concurrency) = cli.concurrency {
        preferences.concurrency = concurrency.max(1);
    }

    let mut fetch_settings = FetchSettings::default();
    if let Some(endpoint) = cli.endpoint {
        fetch_settings.endpoint = endpoint;
    }
    let engine = EngineHandle::new(fetch_settings).context("building the HTTP client")?;

    let existing_match = if cli.exact_match {
        ExistingMatch::ExactStem
    } else {
        ExistingMatch::Substring
    };
    let mut runner = Runner::new(
        engine,
        RunOptions {
            table,
            preferences,
            settings_path: cli.settings,
            existing_match,
            assume_yes: cli.yes,
        },
    );
    if let Some(dest) = cli.dest {
        runner.select(Msg::DestinationSelected(dest));
    }
    if let Some(mode) = cli.mode {
        runner.select(Msg::ModeSelected(mode.into()));
    }
    runner::spawn_interrupt_listener(runner.sender());

    let Some(summary) = runner.run() else {
        bail!("no destination folder; pass --dest");
    };
    match summary.status {
        RunStatus::Failed(reason) => bail!("run failed: {reason}"),
        RunStatus::Completed | RunStatus::Cancelled => Ok(()),
    }
}
