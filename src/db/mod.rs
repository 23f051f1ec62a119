pub mod repository;
pub mod sqlite;

pub use sqlite::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),
}

/// Handle carrying the database location. Each pipeline stage opens its own
/// connection through this so no connection is held across suspension
/// points or shared between concurrent runs.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open(&self) -> Result<rusqlite::Connection, DatabaseError> {
        sqlite::open_database(&self.path)
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}
