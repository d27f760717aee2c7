//! Docbatch core: pure planning rules, validation and the operator session state machine.
mod classify;
mod effect;
mod msg;
mod names;
mod plan;
mod state;
mod summary;
mod table;
mod update;
mod validation;
mod view_model;

pub use classify::{classify, Classification, ItemId, ITEM_ID_PREFIX};
pub use effect::Effect;
pub use msg::Msg;
pub use names::is_plain_entry_name;
pub use plan::{classify_column, select_pending, ColumnItems, ExistingMatch, RunMode, Selection};
pub use state::{AppState, SessionState};
pub use summary::{format_elapsed, RunStatus, RunSummary, RULE};
pub use table::{is_blank_header, Column, Group, SourceTable, PLACEHOLDER_HEADER_PREFIX};
pub use update::update;
pub use validation::{
    validate, ValidationReport, ValidationWarning, WarningKind, BLANK_HEADER_LABEL,
    SUSPICIOUS_HEADER_MIN_LEN,
};
pub use view_model::{AppViewModel, ControlsView};
