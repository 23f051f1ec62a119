use chrono::NaiveDateTime;
use uuid::Uuid;

/// A regulated document under evaluation. Releases attach to a document;
/// the document's typifications decide which criteria apply.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub created_at: NaiveDateTime,
}

/// Top level of the live compliance tree.
#[derive(Debug, Clone)]
pub struct Typification {
    pub id: Uuid,
    pub name: String,
    pub deleted: bool,
}

/// Middle level: groups branches under a typification.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    pub id: Uuid,
    pub typification_id: Uuid,
    pub title: String,
    pub description: String,
}

/// Leaf compliance criterion. Each branch receives one
/// feedback/fulfilled/score triple per release evaluation.
#[derive(Debug, Clone)]
pub struct Branch {
    pub id: Uuid,
    pub taxonomy_id: Uuid,
    pub title: String,
    pub description: String,
}

/// A normative source (law, resolution, circular) cited by tree nodes.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}
