//! Shared test fixtures.

use std::sync::Mutex;

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::release::insert_release;
use crate::db::repository::tree::*;
use crate::models::{Branch, Document, DocumentRelease, SourceRecord, Taxonomy, Typification};
use crate::runtime::NotificationSink;

/// Notification sink that records what it was asked to send.
pub struct RecordingSink {
    pub sent: Mutex<Vec<(Vec<Uuid>, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self { sent: Mutex::new(Vec::new()) }
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for RecordingSink {
    fn send(&self, user_ids: &[Uuid], message_text: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((user_ids.to_vec(), message_text.to_string()));
    }
}

/// Seed: one document with one typification, one taxonomy, two branches,
/// a typification-level source and a taxonomy-level source.
pub fn seed_compliance_tree(conn: &Connection) -> (Document, Typification, Taxonomy, Vec<Branch>) {
    let document = Document {
        id: Uuid::new_v4(),
        title: "Capital adequacy circular".into(),
        created_at: chrono::Utc::now().naive_utc(),
    };
    insert_document(conn, &document).unwrap();

    let typification = Typification {
        id: Uuid::new_v4(),
        name: "Prudential reporting".into(),
        deleted: false,
    };
    insert_typification(conn, &typification).unwrap();
    link_document_typification(conn, &document.id, &typification.id).unwrap();

    let taxonomy = Taxonomy {
        id: Uuid::new_v4(),
        typification_id: typification.id,
        title: "Capital disclosure".into(),
        description: "Disclosure duties around regulatory capital".into(),
    };
    insert_taxonomy(conn, &taxonomy).unwrap();

    let branches: Vec<Branch> = [
        ("Tier 1 ratio published", "The release states the Tier 1 capital ratio."),
        ("Leverage ratio published", "The release states the leverage ratio."),
    ]
    .iter()
    .map(|(title, desc)| {
        let branch = Branch {
            id: Uuid::new_v4(),
            taxonomy_id: taxonomy.id,
            title: (*title).into(),
            description: (*desc).into(),
        };
        insert_branch(conn, &branch).unwrap();
        branch
    })
    .collect();

    let typ_source = SourceRecord {
        id: Uuid::new_v4(),
        name: "Resolution 4.955/2021".into(),
        description: None,
    };
    insert_source(conn, &typ_source).unwrap();
    link_typification_source(conn, &typification.id, &typ_source.id).unwrap();

    let tax_source = SourceRecord {
        id: Uuid::new_v4(),
        name: "Circular 3.930/2019".into(),
        description: Some("Disclosure templates".into()),
    };
    insert_source(conn, &tax_source).unwrap();
    link_taxonomy_source(conn, &taxonomy.id, &tax_source.id).unwrap();

    (document, typification, taxonomy, branches)
}

/// A release row for an already-seeded document.
pub fn seed_release(conn: &Connection, document_id: &Uuid, file_path: &str) -> DocumentRelease {
    let release = DocumentRelease {
        id: Uuid::new_v4(),
        document_id: *document_id,
        file_path: file_path.into(),
        description: None,
        entity_mapping: None,
        created_by: None,
        created_at: chrono::Utc::now().naive_utc(),
        deleted: false,
    };
    insert_release(conn, &release).unwrap();
    release
}
