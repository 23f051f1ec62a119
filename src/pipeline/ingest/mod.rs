pub mod chunker;
pub mod extract;
pub mod types;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Release file missing on disk: {0}")]
    MissingFile(PathBuf),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Extracted text is empty")]
    EmptyText,
}
