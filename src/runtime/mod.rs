//! Pipeline runtime: message bus, stage worker, run tracking, push events,
//! and the caller-side completion wait.

pub mod bus;
pub mod notifier;
pub mod tracker;
pub mod wait;
pub mod worker;

pub use bus::{BusMessage, MessageBus};
pub use notifier::{ProgressBroadcaster, PushEvent, EVENT_RELEASE_UPDATE, EVENT_TEST_RUN_UPDATE};
pub use tracker::RunTracker;
pub use wait::{wait_for_completion, WaitError};
pub use worker::{LogNotificationSink, NotificationSink, WorkerDeps};

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::db::{repository, Database, DatabaseError};
use crate::models::{DocumentRelease, PipelineRun, RunKind};
use crate::pipeline::evaluation::ReleaseEvaluator;
use crate::storage::{FileStore, StorageError};

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// The assembled pipeline service.
///
/// Owns the bus sender and the worker task; dropping the runtime drops the
/// last bus sender, which ends the worker loop.
pub struct Runtime {
    db: Database,
    store: FileStore,
    config: PipelineConfig,
    bus: MessageBus,
    tracker: Arc<RunTracker>,
    worker: JoinHandle<()>,
}

impl Runtime {
    /// Wire the runtime from explicitly constructed dependencies.
    pub fn start(
        db: Database,
        store: FileStore,
        evaluator: ReleaseEvaluator,
        sink: Arc<dyn NotificationSink>,
        config: PipelineConfig,
    ) -> Self {
        let tracker = Arc::new(RunTracker::new(db.clone(), ProgressBroadcaster::default()));
        let (bus, rx) = MessageBus::channel();

        let deps = Arc::new(WorkerDeps {
            db: db.clone(),
            evaluator: Arc::new(evaluator),
            tracker: tracker.clone(),
            bus: bus.clone(),
            sink,
        });
        let worker = worker::spawn_worker(deps, rx);

        Self {
            db,
            store,
            config,
            bus,
            tracker,
            worker,
        }
    }

    pub fn tracker(&self) -> &RunTracker {
        &self.tracker
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Subscribe to progress/completion push events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PushEvent> {
        self.tracker.broadcaster().subscribe()
    }

    /// Accept an upload: persist the file, create the release and its
    /// `PENDING` run, and queue the first pipeline stage.
    pub fn submit_release(
        &self,
        document_id: &Uuid,
        filename: &str,
        bytes: &[u8],
        created_by: Option<Uuid>,
    ) -> Result<(DocumentRelease, PipelineRun), RuntimeError> {
        let path = self.store.save(filename, bytes)?;

        let release = DocumentRelease {
            id: Uuid::new_v4(),
            document_id: *document_id,
            file_path: path.to_string_lossy().into_owned(),
            description: None,
            entity_mapping: None,
            created_by,
            created_at: chrono::Utc::now().naive_utc(),
            deleted: false,
        };

        let conn = self.db.open()?;
        repository::insert_release(&conn, &release)?;
        repository::audit::record(&conn, "create", "document_releases", &release.id.to_string(), None);
        drop(conn);

        let run = self.tracker.create_run(RunKind::Release, Some(release.id))?;
        self.bus.publish(BusMessage::CreateVectors { release_id: release.id });

        tracing::info!(release_id = %release.id, document_id = %document_id, "Release submitted");
        Ok((release, run))
    }

    /// Create a test run: same machine, but the run exists first and spawns
    /// its release, so harnesses can track the run id from the start.
    pub fn submit_test_run(
        &self,
        document_id: &Uuid,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PipelineRun, RuntimeError> {
        let run = self.tracker.create_run(RunKind::TestRun, None)?;

        let path = self.store.save(filename, bytes)?;
        let release = DocumentRelease {
            id: Uuid::new_v4(),
            document_id: *document_id,
            file_path: path.to_string_lossy().into_owned(),
            description: None,
            entity_mapping: None,
            created_by: None,
            created_at: chrono::Utc::now().naive_utc(),
            deleted: false,
        };
        let conn = self.db.open()?;
        repository::insert_release(&conn, &release)?;
        drop(conn);

        self.tracker.attach_release(&run.id, &release.id)?;
        self.bus.publish(BusMessage::CreateVectors { release_id: release.id });

        let run = self
            .tracker
            .get_run(&run.id)?
            .expect("run just created must exist");
        Ok(run)
    }

    /// Wait for a run with the configured poll budget (default 60 × 5 s).
    pub async fn wait_for_run(&self, run_id: Uuid) -> Result<PipelineRun, WaitError> {
        wait::wait_for_completion(
            &self.db,
            run_id,
            self.config.poll_interval,
            self.config.poll_max_attempts,
        )
        .await
    }

    /// Abort the worker task. Normal shutdown is just dropping the runtime.
    pub fn shutdown(self) {
        self.worker.abort();
    }
}
