//! CSV source tables: the first row names the groups, each column lists item ids.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use docbatch_core::{Column, SourceTable};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("could not open table {path:?}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed table: {0}")]
    Csv(#[from] csv::Error),
    #[error("the table has no header row")]
    Empty,
}

pub fn load_table(path: &Path) -> Result<SourceTable, TableError> {
    let file = File::open(path).map_err(|source| TableError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_table(file)
}

/// Parse a table from any reader. Short rows are padded with empty cells.
pub fn read_table<R: Read>(reader: R) -> Result<SourceTable, TableError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut records = csv.records();

    let header = records.next().ok_or(TableError::Empty)??;
    let mut names: Vec<String> = header.iter().map(str::to_string).collect();
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); names.len()];
    let mut rows = 0usize;

    for record in records {
        let record = record?;
        // Extra cells beyond the header get unnamed columns.
        while names.len() < record.len() {
            names.push(String::new());
            cells.push(vec![String::new(); rows]);
        }
        for (index, column) in cells.iter_mut().enumerate() {
            column.push(record.get(index).unwrap_or_default().to_string());
        }
        rows += 1;
    }

    let columns = names
        .into_iter()
        .zip(cells)
        .map(|(name, cells)| Column::new(name, cells))
        .collect();
    Ok(SourceTable::new(columns))
}
