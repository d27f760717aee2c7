use std::collections::HashMap;
use std::path::Path;

use crate::classify::{classify, Classification, ItemId};
use crate::table::SourceTable;

/// Label used for blank-header columns when listing duplicate owners.
pub const BLANK_HEADER_LABEL: &str = "'Blank header'";

/// Headers this long and made only of digits look like item ids.
pub const SUSPICIOUS_HEADER_MIN_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    BlankHeader,
    SuspiciousHeader { header: String },
    /// The header cannot name a folder inside the destination; the group is skipped.
    UnusableFolderName { header: String },
    DuplicateItem { item_id: ItemId, groups: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub kind: WarningKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn duplicates(&self) -> impl Iterator<Item = (&ItemId, &[String])> {
        self.warnings.iter().filter_map(|w| match &w.kind {
            WarningKind::DuplicateItem { item_id, groups } => Some((item_id, groups.as_slice())),
            _ => None,
        })
    }
}

/// Pre-flight check over the table. Pure: no filesystem or network access.
pub fn validate(table: &SourceTable) -> ValidationReport {
    let mut warnings = Vec::new();

    if table.columns().iter().any(|c| c.has_blank_header()) {
        warnings.push(ValidationWarning {
            kind: WarningKind::BlankHeader,
            message: "One or more columns have a blank header.".to_string(),
        });
    }

    for column in table.columns() {
        let header = column.name.trim();
        if looks_like_item_id(header) {
            warnings.push(ValidationWarning {
                kind: WarningKind::SuspiciousHeader {
                    header: header.to_string(),
                },
                message: format!(
                    "Header '{header}' looks like an item id, not a group name."
                ),
            });
        }
    }

    for group in table.groups() {
        if group.folder_path(Path::new("")).is_none() {
            warnings.push(ValidationWarning {
                kind: WarningKind::UnusableFolderName {
                    header: group.name.clone(),
                },
                message: format!(
                    "Header '{}' cannot be used as a folder name; this group will be skipped.",
                    group.name
                ),
            });
        }
    }

    warnings.extend(duplicate_warnings(table));
    ValidationReport { warnings }
}

fn looks_like_item_id(header: &str) -> bool {
    header.chars().count() >= SUSPICIOUS_HEADER_MIN_LEN && header.chars().all(|c| c.is_ascii_digit())
}

fn duplicate_warnings(table: &SourceTable) -> Vec<ValidationWarning> {
    // First-seen order of ids, each with the columns owning it.
    let mut order: Vec<ItemId> = Vec::new();
    let mut owners: HashMap<ItemId, Vec<usize>> = HashMap::new();

    for (index, column) in table.columns().iter().enumerate() {
        for cell in column.non_empty_cells() {
            let Classification::Valid(id) = classify(cell) else {
                continue;
            };
            let columns = owners.entry(id.clone()).or_insert_with(|| {
                order.push(id);
                Vec::new()
            });
            if !columns.contains(&index) {
                columns.push(index);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|id| {
            let columns = owners.remove(&id)?;
            if columns.len() < 2 {
                return None;
            }
            let groups: Vec<String> = columns
                .iter()
                .filter_map(|&index| table.column(index))
                .map(|column| {
                    if column.has_blank_header() {
                        BLANK_HEADER_LABEL.to_string()
                    } else {
                        column.name.trim().to_string()
                    }
                })
                .collect();
            let message = format!("Item {id} appears in columns: {}", groups.join(", "));
            Some(ValidationWarning {
                kind: WarningKind::DuplicateItem { item_id: id, groups },
                message,
            })
        })
        .collect()
}
