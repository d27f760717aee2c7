//! Docbatch engine: fetch pool, group planning, merge stage and run controller.
mod controller;
mod engine;
mod fetch;
mod filename;
mod merge;
mod persist;
mod planner;
mod pool;
mod sink;
mod types;

pub use controller::{
    local_date, DateFn, GroupError, RunConfig, RunContext, RunController, RunError,
};
pub use engine::EngineHandle;
pub use fetch::{
    FetchSettings, Fetcher, ReqwestFetcher, DEFAULT_ENDPOINT, DEFAULT_USER_AGENT,
    DEFAULT_WARMUP_URL, ID_QUERY_PARAM,
};
pub use filename::{disposition_filename, fallback_filename};
pub use merge::{
    compiled_file_name, plan_merge, run_merge, sort_inputs, DocumentMerger, LopdfMerger,
    MergeError, MergeJob, MergeSession,
};
pub use persist::{ensure_output_dir, AtomicFileWriter, PartialFile, PersistError, PARTIAL_PREFIX};
pub use planner::{GroupPlan, GroupPlanner, PlanError};
pub use pool::{run_pool, PoolReport, DEFAULT_CONCURRENCY};
pub use sink::{ChannelEventSink, EventSink};
pub use types::{DownloadOutcome, DownloadTask, FailureKind, FetchError, RunEvent};
