use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("target directory unusable: {0}")]
    Directory(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Writes `content` to `path` through a temp file in the same directory, then renames.
///
/// Readers never observe a half-written file. Missing parent directories are created.
pub fn write_atomically(path: &Path, content: &str) -> Result<PathBuf, PersistError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if dir.exists() && !dir.is_dir() {
        return Err(PersistError::Directory(format!(
            "{} is not a directory",
            dir.display()
        )));
    }
    fs::create_dir_all(&dir).map_err(|e| PersistError::Directory(e.to_string()))?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(path).map_err(|e| PersistError::Io(e.error))?;
    Ok(path.to_path_buf())
}
