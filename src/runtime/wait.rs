use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::db::{repository, Database, DatabaseError};
use crate::models::{PipelineRun, RunStatus};

#[derive(Error, Debug)]
pub enum WaitError {
    /// The poll budget ran out. Distinct from a pipeline `ERROR`: the run
    /// itself may still complete later, and nothing is written into its
    /// state.
    #[error("Run {run_id} did not complete within {attempts} polls at {interval:?} intervals")]
    TimedOut {
        run_id: Uuid,
        attempts: u32,
        interval: Duration,
    },

    /// The run reached `ERROR`.
    #[error("Run {run_id} failed: {message}")]
    RunFailed { run_id: Uuid, message: String },

    #[error("Run not found: {0}")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Poll task failed: {0}")]
    Background(String),
}

/// Poll a run until it completes, at a fixed interval with a bounded number
/// of attempts.
///
/// Each poll opens and drops its own connection inside a blocking task, so
/// nothing is held while sleeping, and concurrent waiters never contend.
pub async fn wait_for_completion(
    db: &Database,
    run_id: Uuid,
    interval: Duration,
    max_attempts: u32,
) -> Result<PipelineRun, WaitError> {
    for attempt in 1..=max_attempts {
        let db = db.clone();
        let run = tokio::task::spawn_blocking(move || -> Result<Option<PipelineRun>, DatabaseError> {
            let conn = db.open()?;
            repository::get_run(&conn, &run_id)
        })
        .await
        .map_err(|e| WaitError::Background(e.to_string()))??;

        let run = run.ok_or(WaitError::NotFound(run_id))?;
        match run.status {
            RunStatus::Completed => return Ok(run),
            RunStatus::Error => {
                return Err(WaitError::RunFailed {
                    run_id,
                    message: run.error.unwrap_or_default(),
                })
            }
            _ => {
                tracing::debug!(
                    run_id = %run_id,
                    attempt,
                    max_attempts,
                    status = run.status.as_str(),
                    "Run not finished yet"
                );
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(interval).await;
        }
    }

    Err(WaitError::TimedOut {
        run_id,
        attempts: max_attempts,
        interval,
    })
}
