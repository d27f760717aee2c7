use std::path::{Path, PathBuf};

use crate::names::is_plain_entry_name;

/// Header prefix produced by spreadsheet readers for columns without a name.
pub const PLACEHOLDER_HEADER_PREFIX: &str = "Unnamed:";

/// One column of the source table: a display name and its raw cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Column {
    pub name: String,
    pub cells: Vec<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<String>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    /// True when the header is empty or a reader-generated placeholder.
    pub fn has_blank_header(&self) -> bool {
        is_blank_header(&self.name)
    }

    /// Cells that are not empty after trimming, in column order.
    pub fn non_empty_cells(&self) -> impl Iterator<Item = &str> {
        self.cells
            .iter()
            .map(String::as_str)
            .filter(|cell| !cell.trim().is_empty())
    }
}

pub fn is_blank_header(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty() || trimmed.starts_with(PLACEHOLDER_HEADER_PREFIX)
}

/// Ordered, immutable set of named columns all treated as text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceTable {
    columns: Vec<Column>,
}

impl SourceTable {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Build a table from `(header, cells)` pairs.
    pub fn from_columns<N, I, C>(columns: I) -> Self
    where
        N: Into<String>,
        C: Into<String>,
        I: IntoIterator<Item = (N, Vec<C>)>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, cells)| Column::new(name, cells.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Groups derived from the columns, 1:1 and in column order.
    pub fn groups(&self) -> Vec<Group> {
        let mut untitled = 0usize;
        self.columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let name = if column.has_blank_header() {
                    untitled += 1;
                    format!("Untitled {untitled}")
                } else {
                    column.name.trim().to_string()
                };
                Group::new(index, name)
            })
            .collect()
    }
}

/// A named partition of work, bound to one source column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Group {
    pub column: usize,
    pub name: String,
}

impl Group {
    pub fn new(column: usize, name: impl Into<String>) -> Self {
        Self {
            column,
            name: name.into(),
        }
    }

    /// Lower-cased name used for the folder and compiled output file names.
    pub fn folder_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// Folder of this group directly under `destination_root`, or `None` when
    /// the name is not a single plain folder name (absolute, `..`, separators).
    pub fn folder_path(&self, destination_root: &Path) -> Option<PathBuf> {
        let name = self.folder_name();
        is_plain_entry_name(&name).then(|| destination_root.join(name))
    }
}
