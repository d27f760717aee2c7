use std::fmt;
use std::path::Path;

use crate::classify::{classify, Classification, ItemId};
use crate::table::Column;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Wipe each group folder and fetch every valid item again.
    Destructive,
    /// Keep existing files and fetch only items not yet present.
    #[default]
    Incremental,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Destructive => write!(f, "destructive"),
            RunMode::Incremental => write!(f, "incremental"),
        }
    }
}

/// How an existing file name is matched against an item id in incremental mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingMatch {
    /// The id occurs anywhere in the file name. Tolerates decorated names but
    /// over-excludes when one id is a substring of another file name.
    #[default]
    Substring,
    /// The file stem equals the id.
    ExactStem,
}

impl ExistingMatch {
    pub fn matches(self, item_id: &str, file_name: &str) -> bool {
        match self {
            ExistingMatch::Substring => file_name.contains(item_id),
            ExistingMatch::ExactStem => Path::new(file_name)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .is_some_and(|stem| stem == item_id),
        }
    }
}

/// Classified contents of one column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnItems {
    pub valid: Vec<ItemId>,
    /// Trimmed cells that failed classification.
    pub ignored: Vec<String>,
}

pub fn classify_column(column: &Column) -> ColumnItems {
    let mut items = ColumnItems::default();
    for cell in column.non_empty_cells() {
        match classify(cell) {
            Classification::Valid(id) => items.valid.push(id),
            Classification::Invalid => items.ignored.push(cell.trim().to_string()),
        }
    }
    items
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub pending: Vec<ItemId>,
    pub present: Vec<ItemId>,
}

/// Split valid ids into those still to fetch and those already on disk.
///
/// An id repeated within the same column is scheduled once.
pub fn select_pending(
    valid: &[ItemId],
    existing_file_names: &[String],
    policy: ExistingMatch,
) -> Selection {
    let mut selection = Selection::default();
    for id in valid {
        if selection.pending.contains(id) || selection.present.contains(id) {
            continue;
        }
        let present = existing_file_names
            .iter()
            .any(|name| policy.matches(id.as_str(), name));
        if present {
            selection.present.push(id.clone());
        } else {
            selection.pending.push(id.clone());
        }
    }
    selection
}
