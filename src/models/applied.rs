use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::SourceParent;

/// Frozen copy of a typification for one release.
///
/// `original_id` points back to the live node and goes stale (stays set,
/// dangling) if the live node is later removed; the snapshot itself is
/// self-contained.
#[derive(Debug, Clone)]
pub struct AppliedTypification {
    pub id: Uuid,
    pub release_id: Uuid,
    pub original_id: Option<Uuid>,
    pub name: String,
}

/// Frozen copy of a taxonomy for one release.
#[derive(Debug, Clone)]
pub struct AppliedTaxonomy {
    pub id: Uuid,
    pub release_id: Uuid,
    pub applied_typification_id: Uuid,
    pub original_id: Option<Uuid>,
    pub title: String,
    pub description: String,
}

/// Frozen copy of a branch for one release, carrying the evaluation result
/// once the pipeline has scored it.
#[derive(Debug, Clone)]
pub struct AppliedBranch {
    pub id: Uuid,
    pub release_id: Uuid,
    pub applied_taxonomy_id: Uuid,
    pub original_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub feedback: Option<String>,
    pub fulfilled: Option<bool>,
    pub score: Option<f64>,
    /// JSON-encoded anonymization mapping used while producing `feedback`,
    /// kept so the feedback can be de-anonymized for display.
    pub entity_mapping: Option<String>,
}

impl AppliedBranch {
    pub fn is_scored(&self) -> bool {
        self.feedback.is_some() && self.fulfilled.is_some() && self.score.is_some()
    }
}

/// Frozen copy of a source attached to an applied typification or taxonomy.
#[derive(Debug, Clone)]
pub struct AppliedSource {
    pub id: Uuid,
    pub release_id: Uuid,
    pub parent_kind: SourceParent,
    pub parent_id: Uuid,
    pub original_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
}

/// The fully materialized snapshot for one release.
#[derive(Debug, Clone, Default)]
pub struct AppliedTree {
    pub typifications: Vec<AppliedTypification>,
    pub taxonomies: Vec<AppliedTaxonomy>,
    pub branches: Vec<AppliedBranch>,
}

/// Everything prompt construction needs for one branch, denormalized so the
/// evaluation stage can flow it through pure transformations by value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchContext {
    pub applied_branch_id: Uuid,
    pub title: String,
    pub description: String,
    pub taxonomy_title: String,
    pub typification_name: String,
    pub source_names: Vec<String>,
}
