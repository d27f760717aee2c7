use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use docbatch_core::{
    classify_column, select_pending, ExistingMatch, Group, RunMode, Selection, SourceTable,
};
use docbatch_logging::engine_debug;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::DownloadTask;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("group column {0} is missing from the table")]
    MissingColumn(usize),
    #[error("group name {0:?} cannot be used as a folder name")]
    UnusableFolderName(String),
    #[error("could not reset folder {path}: {source}")]
    Reset { path: PathBuf, source: io::Error },
    #[error("could not list folder {path}: {source}")]
    List { path: PathBuf, source: io::Error },
}

/// Work for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPlan {
    pub group: Group,
    pub folder: PathBuf,
    pub tasks: Vec<DownloadTask>,
    /// Cells that failed classification, trimmed.
    pub ignored: Vec<String>,
    pub valid_count: usize,
    /// Valid ids skipped because a matching file already exists.
    pub already_present: usize,
    /// Folder existed before planning and was inspected for existing items.
    pub inspected_existing: bool,
}

/// Plans groups of one run. Remembers which folders it already reset so two
/// columns sharing a folder do not wipe each other's downloads.
#[derive(Debug)]
pub struct GroupPlanner {
    destination_root: PathBuf,
    mode: RunMode,
    existing_match: ExistingMatch,
    reset_folders: HashSet<PathBuf>,
}

impl GroupPlanner {
    pub fn new(destination_root: PathBuf, mode: RunMode, existing_match: ExistingMatch) -> Self {
        Self {
            destination_root,
            mode,
            existing_match,
            reset_folders: HashSet::new(),
        }
    }

    pub fn plan(
        &mut self,
        table: &SourceTable,
        group: &Group,
        cancel: &CancellationToken,
    ) -> Result<GroupPlan, PlanError> {
        let column = table
            .column(group.column)
            .ok_or(PlanError::MissingColumn(group.column))?;
        let folder = group
            .folder_path(&self.destination_root)
            .ok_or_else(|| PlanError::UnusableFolderName(group.name.clone()))?;
        let items = classify_column(column);

        let mut plan = GroupPlan {
            group: group.clone(),
            folder: folder.clone(),
            tasks: Vec::new(),
            ignored: items.ignored,
            valid_count: items.valid.len(),
            already_present: 0,
            inspected_existing: false,
        };
        // Nothing destructive once the run is cancelled.
        if cancel.is_cancelled() {
            return Ok(plan);
        }

        let selection = match self.mode {
            RunMode::Destructive => {
                self.reset_once(&folder)?;
                select_pending(&items.valid, &[], self.existing_match)
            }
            RunMode::Incremental => match existing_file_names(&folder)? {
                Some(existing) => {
                    plan.inspected_existing = true;
                    select_pending(&items.valid, &existing, self.existing_match)
                }
                None => select_pending(&items.valid, &[], self.existing_match),
            },
        };

        let Selection { pending, present } = selection;
        plan.already_present = present.len();
        plan.tasks = pending
            .into_iter()
            .map(|item_id| DownloadTask {
                item_id,
                group: group.clone(),
                target_folder: folder.clone(),
            })
            .collect();
        Ok(plan)
    }

    fn reset_once(&mut self, folder: &Path) -> Result<(), PlanError> {
        if !self.reset_folders.insert(folder.to_path_buf()) {
            return Ok(());
        }
        if folder.is_dir() {
            engine_debug!("Removing folder {:?}", folder);
            fs::remove_dir_all(folder).map_err(|source| PlanError::Reset {
                path: folder.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Names of the entries in `folder`, or `None` when the folder does not exist.
fn existing_file_names(folder: &Path) -> Result<Option<Vec<String>>, PlanError> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PlanError::List {
                path: folder.to_path_buf(),
                source,
            })
        }
    };
    let names = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    Ok(Some(names))
}
