//! Operator preferences kept between runs in a small RON file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use docbatch_core::RunMode;
use docbatch_engine::{AtomicFileWriter, PersistError, DEFAULT_CONCURRENCY};
use docbatch_logging::{engine_info, engine_warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SETTINGS_FILENAME: &str = "docbatch.ron";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings path {0:?} has no file name")]
    InvalidPath(PathBuf),
    #[error("could not serialize settings: {0}")]
    Serialize(#[from] ron::Error),
    #[error("could not write settings: {0}")]
    Write(#[from] PersistError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub destination: Option<PathBuf>,
    pub destructive: bool,
    pub concurrency: usize,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            destination: None,
            destructive: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl Preferences {
    pub fn mode(&self) -> RunMode {
        if self.destructive {
            RunMode::Destructive
        } else {
            RunMode::Incremental
        }
    }

    pub fn set_mode(&mut self, mode: RunMode) {
        self.destructive = mode == RunMode::Destructive;
    }
}

/// Read preferences from `path`. A missing or unreadable file yields defaults.
pub fn load(path: &Path) -> Preferences {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Preferences::default(),
        Err(err) => {
            engine_warn!("Failed to read settings from {:?}: {}", path, err);
            return Preferences::default();
        }
    };
    match ron::from_str(&content) {
        Ok(preferences) => {
            engine_info!("Loaded settings from {:?}", path);
            preferences
        }
        Err(err) => {
            engine_warn!("Failed to parse settings from {:?}: {}", path, err);
            Preferences::default()
        }
    }
}

pub fn save(path: &Path, preferences: &Preferences) -> Result<(), SettingsError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| SettingsError::InvalidPath(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let content = ron::ser::to_string_pretty(preferences, ron::ser::PrettyConfig::new())?;
    AtomicFileWriter::new(dir).write(file_name, content.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let loaded = load(&temp.path().join(SETTINGS_FILENAME));
        assert_eq!(loaded, Preferences::default());
        assert_eq!(loaded.mode(), RunMode::Incremental);
    }

    #[test]
    fn saved_preferences_load_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SETTINGS_FILENAME);
        let mut preferences = Preferences {
            destination: Some(PathBuf::from("/data/receipts")),
            concurrency: 4,
            ..Preferences::default()
        };
        preferences.set_mode(RunMode::Destructive);

        save(&path, &preferences).unwrap();

        assert_eq!(load(&path), preferences);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SETTINGS_FILENAME);
        fs::write(&path, "(destination: Some(").unwrap();

        assert_eq!(load(&path), Preferences::default());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SETTINGS_FILENAME);
        fs::write(&path, "(destructive: true)").unwrap();

        let loaded = load(&path);
        assert!(loaded.destructive);
        assert_eq!(loaded.concurrency, DEFAULT_CONCURRENCY);
    }
}
