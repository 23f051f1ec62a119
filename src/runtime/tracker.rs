use uuid::Uuid;

use super::notifier::{ProgressBroadcaster, PushEvent, EVENT_RELEASE_UPDATE, EVENT_TEST_RUN_UPDATE};
use crate::db::{repository, Database, DatabaseError};
use crate::models::{PipelineRun, ReleaseView, RunKind, RunStatus, RunView};

/// Single writer of pipeline run state.
///
/// Every stage transition goes through here; all other components read.
/// Each write opens its own short-lived connection and every transition
/// emits one push event carrying the full current view of the run.
pub struct RunTracker {
    db: Database,
    broadcaster: ProgressBroadcaster,
}

impl RunTracker {
    pub fn new(db: Database, broadcaster: ProgressBroadcaster) -> Self {
        Self { db, broadcaster }
    }

    pub fn broadcaster(&self) -> &ProgressBroadcaster {
        &self.broadcaster
    }

    /// Create a run in `PENDING` and announce it.
    pub fn create_run(
        &self,
        kind: RunKind,
        release_id: Option<Uuid>,
    ) -> Result<PipelineRun, DatabaseError> {
        let now = chrono::Utc::now().naive_utc();
        let run = PipelineRun {
            id: Uuid::new_v4(),
            kind,
            release_id,
            status: RunStatus::Pending,
            progress: String::new(),
            error: None,
            created_at: now,
            updated_at: now,
        };

        let conn = self.db.open()?;
        repository::insert_run(&conn, &run)?;
        self.emit(&conn, &run.id);
        Ok(run)
    }

    /// Attach the spawned release to a test run.
    pub fn attach_release(&self, run_id: &Uuid, release_id: &Uuid) -> Result<(), DatabaseError> {
        let conn = self.db.open()?;
        repository::set_run_release(&conn, run_id, release_id)
    }

    /// Move a run to a new status with a progress message.
    ///
    /// Terminal states are final: a transition out of `COMPLETED` or
    /// `ERROR` is a bug in the caller and is rejected.
    pub fn transition(
        &self,
        run_id: &Uuid,
        status: RunStatus,
        progress: &str,
    ) -> Result<(), DatabaseError> {
        let conn = self.db.open()?;
        let current = repository::get_run(&conn, run_id)?.ok_or_else(|| DatabaseError::NotFound {
            entity_type: "PipelineRun".into(),
            id: run_id.to_string(),
        })?;
        if current.status.is_terminal() {
            return Err(DatabaseError::ConstraintViolation(format!(
                "run {run_id} is already {}",
                current.status
            )));
        }

        repository::update_run(&conn, run_id, status, progress, None)?;
        tracing::info!(run_id = %run_id, status = status.as_str(), progress, "Run transition");
        self.emit(&conn, run_id);
        Ok(())
    }

    /// Record a stage-level failure: status → `ERROR` with the error text
    /// verbatim, then broadcast.
    pub fn fail(&self, run_id: &Uuid, error: &str) {
        let result = (|| -> Result<(), DatabaseError> {
            let conn = self.db.open()?;
            repository::update_run(&conn, run_id, RunStatus::Error, "pipeline failed", Some(error))?;
            self.emit(&conn, run_id);
            Ok(())
        })();

        match result {
            Ok(()) => tracing::error!(run_id = %run_id, error, "Run failed"),
            Err(e) => tracing::error!(run_id = %run_id, error, tracker_error = %e, "Run failed and the failure could not be recorded"),
        }
    }

    /// Read-only view for pollers.
    pub fn get_run(&self, run_id: &Uuid) -> Result<Option<PipelineRun>, DatabaseError> {
        let conn = self.db.open()?;
        repository::get_run(&conn, run_id)
    }

    pub fn run_for_release(&self, release_id: &Uuid) -> Result<Option<PipelineRun>, DatabaseError> {
        let conn = self.db.open()?;
        repository::get_run_for_release(&conn, release_id)
    }

    /// Build the full public view and publish one push event for it.
    fn emit(&self, conn: &rusqlite::Connection, run_id: &Uuid) {
        let view = match self.load_view(conn, run_id) {
            Ok(Some(view)) => view,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(run_id = %run_id, error = %e, "Could not build run view for broadcast");
                return;
            }
        };

        let event = match view.kind {
            RunKind::Release => EVENT_RELEASE_UPDATE,
            RunKind::TestRun => EVENT_TEST_RUN_UPDATE,
        };
        self.broadcaster.publish(PushEvent {
            event: event.to_string(),
            message: view.status.as_str().to_string(),
            payload: view,
        });
    }

    fn load_view(
        &self,
        conn: &rusqlite::Connection,
        run_id: &Uuid,
    ) -> Result<Option<RunView>, DatabaseError> {
        let Some(run) = repository::get_run(conn, run_id)? else {
            return Ok(None);
        };
        let release = match run.release_id {
            Some(release_id) => repository::get_release(conn, &release_id)?
                .as_ref()
                .map(ReleaseView::from),
            None => None,
        };
        Ok(Some(RunView::new(&run, release)))
    }
}
