use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One uploaded document version submitted for compliance evaluation.
///
/// `description` stays empty until the evaluation pipeline completes and
/// writes the model-generated summary. Releases are never hard-deleted.
#[derive(Debug, Clone)]
pub struct DocumentRelease {
    pub id: Uuid,
    pub document_id: Uuid,
    pub file_path: String,
    pub description: Option<String>,
    /// Run-scoped anonymization mapping, persisted between pipeline stages.
    /// JSON-encoded; never exposed in the public view.
    pub entity_mapping: Option<String>,
    /// Uploading user, when known; the completion notification goes here.
    pub created_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub deleted: bool,
}

impl DocumentRelease {
    /// Identifier used as the vector-index source filter for this release's
    /// chunks. One uploaded file maps to one source.
    pub fn source_id(&self) -> String {
        self.id.to_string()
    }
}

/// The public view of a release, as carried in push-event payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseView {
    pub id: Uuid,
    pub document_id: Uuid,
    pub description: Option<String>,
    pub created_at: String,
    pub deleted: bool,
}

impl From<&DocumentRelease> for ReleaseView {
    fn from(release: &DocumentRelease) -> Self {
        Self {
            id: release.id,
            document_id: release.document_id,
            description: release.description.clone(),
            created_at: release.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            deleted: release.deleted,
        }
    }
}
