mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use docbatch_core::{RunMode, RunStatus, RunSummary, SourceTable};
use common::{one_page_pdf, page_contents};
use docbatch_engine::{
    DownloadOutcome, DownloadTask, EngineHandle, FetchError, Fetcher, LopdfMerger, RunConfig,
    RunEvent,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Writes a one-page `<id>.pdf` without any network traffic.
struct LocalFetcher;

#[async_trait::async_trait]
impl Fetcher for LocalFetcher {
    async fn warm_up(&self) -> Result<(), FetchError> {
        Ok(())
    }

    async fn download(&self, task: &DownloadTask, _cancel: &CancellationToken) -> DownloadOutcome {
        let path = task.target_folder.join(format!("{}.pdf", task.item_id));
        fs::write(&path, one_page_pdf(task.item_id.as_str())).unwrap();
        DownloadOutcome::Success {
            item_id: task.item_id.clone(),
            path,
        }
    }
}

fn engine() -> EngineHandle {
    EngineHandle::with_components(
        Arc::new(LocalFetcher),
        Arc::new(LopdfMerger),
        "pdf",
        Arc::new(|| "2024-05-01".to_string()),
    )
}

/// Collect events until the run finishes or `stop` matches.
fn wait_for(engine: &EngineHandle, stop: impl Fn(&RunEvent) -> bool) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Ok(event) = engine.recv_timeout(Duration::from_secs(10)) {
        let done = stop(&event);
        events.push(event);
        if done {
            return events;
        }
    }
    panic!("engine went quiet; events so far: {events:?}");
}

fn finished(events: &[RunEvent]) -> &RunSummary {
    match events.last() {
        Some(RunEvent::Finished(summary)) => summary,
        other => panic!("expected Finished, got {other:?}"),
    }
}

#[test]
fn clean_table_runs_without_confirmation() {
    let temp = TempDir::new().unwrap();
    let engine = engine();
    let table = SourceTable::from_columns(vec![("Alice", vec!["500111", "500112"])]);

    engine.start(RunConfig::new(temp.path(), RunMode::Destructive), table);
    let events = wait_for(&engine, |e| matches!(e, RunEvent::Finished(_)));

    assert!(events
        .iter()
        .any(|e| matches!(e, RunEvent::Validated(report) if report.is_clean())));
    assert!(!events.iter().any(|e| matches!(e, RunEvent::AwaitingConfirmation)));
    let summary = finished(&events);
    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.total_downloaded, 2);
    let pages = page_contents(&temp.path().join("alice").join("alice_compiled.pdf"));
    assert_eq!(pages.len(), 2);
    assert!(pages[0].contains("(500111)"));
}

fn duplicated_table() -> SourceTable {
    SourceTable::from_columns(vec![
        ("Alice", vec!["500111"]),
        ("Bob", vec!["500111"]),
    ])
}

#[test]
fn warnings_wait_for_confirmation_then_continue() {
    let temp = TempDir::new().unwrap();
    let engine = engine();

    engine.start(
        RunConfig::new(temp.path(), RunMode::Incremental),
        duplicated_table(),
    );
    wait_for(&engine, |e| matches!(e, RunEvent::AwaitingConfirmation));
    assert!(!temp.path().join("alice").exists());

    engine.confirm();
    let events = wait_for(&engine, |e| matches!(e, RunEvent::Finished(_)));

    assert!(events
        .iter()
        .any(|e| matches!(e, RunEvent::Log(line) if line == "Continuing with the downloads...")));
    let summary = finished(&events);
    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.total_downloaded, 2);
}

#[test]
fn cancel_while_awaiting_confirmation_discards_the_run() {
    let temp = TempDir::new().unwrap();
    let engine = engine();

    engine.start(
        RunConfig::new(temp.path(), RunMode::Destructive),
        duplicated_table(),
    );
    wait_for(&engine, |e| matches!(e, RunEvent::AwaitingConfirmation));
    engine.cancel();
    let events = wait_for(&engine, |e| matches!(e, RunEvent::Finished(_)));

    assert_eq!(finished(&events).status, RunStatus::Cancelled);
    assert!(!temp.path().join("alice").exists());
    assert!(!temp.path().join("bob").exists());
}
