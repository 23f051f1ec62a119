use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::DocumentRelease;

pub fn insert_release(conn: &Connection, release: &DocumentRelease) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO document_releases (id, document_id, file_path, description, entity_mapping,
         created_by, created_at, deleted)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            release.id.to_string(),
            release.document_id.to_string(),
            release.file_path,
            release.description,
            release.entity_mapping,
            release.created_by.map(|id| id.to_string()),
            release.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            release.deleted as i32,
        ],
    )?;
    Ok(())
}

pub fn get_release(conn: &Connection, id: &Uuid) -> Result<Option<DocumentRelease>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, document_id, file_path, description, entity_mapping, created_by, created_at, deleted
         FROM document_releases WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], |row| {
        Ok(ReleaseRow {
            id: row.get::<_, String>(0)?,
            document_id: row.get::<_, String>(1)?,
            file_path: row.get::<_, String>(2)?,
            description: row.get::<_, Option<String>>(3)?,
            entity_mapping: row.get::<_, Option<String>>(4)?,
            created_by: row.get::<_, Option<String>>(5)?,
            created_at: row.get::<_, String>(6)?,
            deleted: row.get::<_, i32>(7)?,
        })
    });

    match result {
        Ok(row) => Ok(Some(release_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All live (not soft-deleted) releases of one document, newest first.
pub fn get_releases_for_document(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Vec<DocumentRelease>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, document_id, file_path, description, entity_mapping, created_by, created_at, deleted
         FROM document_releases WHERE document_id = ?1 AND deleted = 0
         ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map(params![document_id.to_string()], |row| {
        Ok(ReleaseRow {
            id: row.get::<_, String>(0)?,
            document_id: row.get::<_, String>(1)?,
            file_path: row.get::<_, String>(2)?,
            description: row.get::<_, Option<String>>(3)?,
            entity_mapping: row.get::<_, Option<String>>(4)?,
            created_by: row.get::<_, Option<String>>(5)?,
            created_at: row.get::<_, String>(6)?,
            deleted: row.get::<_, i32>(7)?,
        })
    })?;

    let mut releases = Vec::new();
    for row in rows {
        releases.push(release_from_row(row?)?);
    }
    Ok(releases)
}

/// Set the model-generated summary once evaluation completes.
pub fn update_release_description(
    conn: &Connection,
    release_id: &Uuid,
    description: &str,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE document_releases SET description = ?2 WHERE id = ?1",
        params![release_id.to_string(), description],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "DocumentRelease".into(),
            id: release_id.to_string(),
        });
    }
    Ok(())
}

/// Persist the run-scoped anonymization mapping between pipeline stages.
pub fn update_release_mapping(
    conn: &Connection,
    release_id: &Uuid,
    mapping_json: &str,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE document_releases SET entity_mapping = ?2 WHERE id = ?1",
        params![release_id.to_string(), mapping_json],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "DocumentRelease".into(),
            id: release_id.to_string(),
        });
    }
    Ok(())
}

/// Releases are never hard-deleted; history must stay traceable.
pub fn soft_delete_release(conn: &Connection, release_id: &Uuid) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE document_releases SET deleted = 1 WHERE id = ?1",
        params![release_id.to_string()],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "DocumentRelease".into(),
            id: release_id.to_string(),
        });
    }
    super::audit::record(conn, "delete", "document_releases", &release_id.to_string(), None);
    Ok(())
}

// Internal row type for DocumentRelease mapping
struct ReleaseRow {
    id: String,
    document_id: String,
    file_path: String,
    description: Option<String>,
    entity_mapping: Option<String>,
    created_by: Option<String>,
    created_at: String,
    deleted: i32,
}

fn release_from_row(row: ReleaseRow) -> Result<DocumentRelease, DatabaseError> {
    Ok(DocumentRelease {
        id: parse_uuid(&row.id)?,
        document_id: parse_uuid(&row.document_id)?,
        file_path: row.file_path,
        description: row.description,
        entity_mapping: row.entity_mapping,
        created_by: row.created_by.as_deref().map(parse_uuid).transpose()?,
        created_at: parse_timestamp(&row.created_at),
        deleted: row.deleted != 0,
    })
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

pub(crate) fn parse_timestamp(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .unwrap_or_default()
}
