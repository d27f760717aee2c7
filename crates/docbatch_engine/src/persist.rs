use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use thiserror::Error;

/// Name prefix of in-progress files; such entries are never merge inputs.
pub const PARTIAL_PREFIX: &str = ".docbatch-";
const PARTIAL_SUFFIX: &str = ".part";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// A file being written inside `dir` under a hidden temporary name.
///
/// Only [`PartialFile::persist`] gives it its final name; dropping it removes
/// the temporary file, so an aborted write never looks like a finished one.
pub struct PartialFile {
    dir: PathBuf,
    tmp: NamedTempFile,
}

impl PartialFile {
    pub fn create(dir: &Path) -> Result<Self, PersistError> {
        let tmp = Builder::new()
            .prefix(PARTIAL_PREFIX)
            .suffix(PARTIAL_SUFFIX)
            .tempfile_in(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            tmp,
        })
    }

    /// Flush, sync and rename to `{dir}/{filename}`, replacing any existing file.
    pub fn persist(mut self, filename: &str) -> Result<PathBuf, PersistError> {
        self.tmp.flush()?;
        self.tmp.as_file_mut().sync_all()?;

        let target = self.dir.join(filename);
        if target.exists() {
            fs::remove_file(&target)?;
        }
        self.tmp
            .persist(&target)
            .map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

impl Write for PartialFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tmp.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tmp.flush()
    }
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let mut file = PartialFile::create(&self.dir)?;
        file.write_all(content)?;
        file.persist(filename)
    }
}
