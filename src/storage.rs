use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    NotFound(PathBuf),
}

/// On-disk store for uploaded release files.
///
/// Files are written under a single root with a uuid prefix so repeated
/// uploads of the same filename never collide.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Persist uploaded bytes, returning the stored path.
    pub fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.root)?;
        let safe_name = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload");
        let path = self.root.join(format!("{}_{safe_name}", Uuid::new_v4()));
        fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "Stored release file");
        Ok(path)
    }

    /// Remove a stored file. Missing files are reported, not ignored.
    pub fn delete(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            return Err(StorageError::NotFound(path.to_path_buf()));
        }
        fs::remove_file(path)?;
        Ok(())
    }
}
