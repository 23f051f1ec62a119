use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{RunKind, RunStatus};
use super::release::ReleaseView;

/// Tracked state of one release evaluation (or test run).
///
/// Written only by the run tracker; everyone else reads.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub id: Uuid,
    pub kind: RunKind,
    /// The release this run drives. Null only for a test run that has not
    /// spawned its release yet.
    pub release_id: Option<Uuid>,
    pub status: RunStatus,
    pub progress: String,
    pub error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Full public view of a run, carried whole in every push event so a
/// late-joining listener can render current state from one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunView {
    pub id: Uuid,
    pub kind: RunKind,
    pub status: RunStatus,
    pub progress: String,
    pub error: Option<String>,
    pub release: Option<ReleaseView>,
}

impl RunView {
    pub fn new(run: &PipelineRun, release: Option<ReleaseView>) -> Self {
        Self {
            id: run.id,
            kind: run.kind,
            status: run.status,
            progress: run.progress.clone(),
            error: run.error.clone(),
            release,
        }
    }
}
