use rusqlite::{params, Connection};
use uuid::Uuid;

use super::release::parse_uuid;
use crate::db::DatabaseError;
use crate::models::{
    AppliedBranch, AppliedSource, AppliedTaxonomy, AppliedTree, AppliedTypification, SourceParent,
};

pub fn insert_applied_typification(
    conn: &Connection,
    typ: &AppliedTypification,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO applied_typifications (id, release_id, original_id, name)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            typ.id.to_string(),
            typ.release_id.to_string(),
            typ.original_id.map(|id| id.to_string()),
            typ.name,
        ],
    )?;
    Ok(())
}

/// Duplicate-detection lookup run before every insert: at most one applied
/// typification may exist per (release, original-id).
pub fn find_applied_typification(
    conn: &Connection,
    release_id: &Uuid,
    original_id: &Uuid,
) -> Result<Option<AppliedTypification>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, release_id, original_id, name FROM applied_typifications
         WHERE release_id = ?1 AND original_id = ?2",
        params![release_id.to_string(), original_id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        },
    );

    match result {
        Ok((id, release, original, name)) => Ok(Some(AppliedTypification {
            id: parse_uuid(&id)?,
            release_id: parse_uuid(&release)?,
            original_id: original.as_deref().map(parse_uuid).transpose()?,
            name,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_applied_taxonomy(
    conn: &Connection,
    taxonomy: &AppliedTaxonomy,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO applied_taxonomies (id, release_id, applied_typification_id, original_id,
         title, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            taxonomy.id.to_string(),
            taxonomy.release_id.to_string(),
            taxonomy.applied_typification_id.to_string(),
            taxonomy.original_id.map(|id| id.to_string()),
            taxonomy.title,
            taxonomy.description,
        ],
    )?;
    Ok(())
}

pub fn find_applied_taxonomy(
    conn: &Connection,
    release_id: &Uuid,
    original_id: &Uuid,
) -> Result<Option<AppliedTaxonomy>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, release_id, applied_typification_id, original_id, title, description
         FROM applied_taxonomies WHERE release_id = ?1 AND original_id = ?2",
        params![release_id.to_string(), original_id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        },
    );

    match result {
        Ok((id, release, typ, original, title, description)) => Ok(Some(AppliedTaxonomy {
            id: parse_uuid(&id)?,
            release_id: parse_uuid(&release)?,
            applied_typification_id: parse_uuid(&typ)?,
            original_id: original.as_deref().map(parse_uuid).transpose()?,
            title,
            description,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_applied_branch(conn: &Connection, branch: &AppliedBranch) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO applied_branches (id, release_id, applied_taxonomy_id, original_id,
         title, description, feedback, fulfilled, score, entity_mapping)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            branch.id.to_string(),
            branch.release_id.to_string(),
            branch.applied_taxonomy_id.to_string(),
            branch.original_id.map(|id| id.to_string()),
            branch.title,
            branch.description,
            branch.feedback,
            branch.fulfilled.map(|f| f as i32),
            branch.score,
            branch.entity_mapping,
        ],
    )?;
    Ok(())
}

/// Write one branch's evaluation result onto the snapshot, along with the
/// anonymization mapping needed to de-anonymize the feedback later.
pub fn write_branch_result(
    conn: &Connection,
    applied_branch_id: &Uuid,
    feedback: &str,
    fulfilled: bool,
    score: f64,
    entity_mapping: &str,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE applied_branches SET feedback = ?2, fulfilled = ?3, score = ?4, entity_mapping = ?5
         WHERE id = ?1",
        params![
            applied_branch_id.to_string(),
            feedback,
            fulfilled as i32,
            score,
            entity_mapping,
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "AppliedBranch".into(),
            id: applied_branch_id.to_string(),
        });
    }
    Ok(())
}

pub fn insert_applied_source(conn: &Connection, source: &AppliedSource) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO applied_sources (id, release_id, parent_kind, parent_id, original_id,
         name, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            source.id.to_string(),
            source.release_id.to_string(),
            source.parent_kind.as_str(),
            source.parent_id.to_string(),
            source.original_id.map(|id| id.to_string()),
            source.name,
            source.description,
        ],
    )?;
    Ok(())
}

/// Names of the applied sources attached to one snapshot node.
pub fn applied_source_names(
    conn: &Connection,
    parent_kind: SourceParent,
    parent_id: &Uuid,
) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM applied_sources WHERE parent_kind = ?1 AND parent_id = ?2 ORDER BY name",
    )?;
    let rows = stmt.query_map(
        params![parent_kind.as_str(), parent_id.to_string()],
        |row| row.get::<_, String>(0),
    )?;

    let mut names = Vec::new();
    for row in rows {
        names.push(row?);
    }
    Ok(names)
}

/// Load the full snapshot for one release.
pub fn get_applied_tree(conn: &Connection, release_id: &Uuid) -> Result<AppliedTree, DatabaseError> {
    let release = release_id.to_string();
    let mut tree = AppliedTree::default();

    let mut stmt = conn.prepare(
        "SELECT id, release_id, original_id, name FROM applied_typifications WHERE release_id = ?1",
    )?;
    let rows = stmt.query_map(params![release], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;
    for row in rows {
        let (id, release, original, name) = row?;
        tree.typifications.push(AppliedTypification {
            id: parse_uuid(&id)?,
            release_id: parse_uuid(&release)?,
            original_id: original.as_deref().map(parse_uuid).transpose()?,
            name,
        });
    }

    let mut stmt = conn.prepare(
        "SELECT id, release_id, applied_typification_id, original_id, title, description
         FROM applied_taxonomies WHERE release_id = ?1",
    )?;
    let rows = stmt.query_map(params![release], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;
    for row in rows {
        let (id, release, typ, original, title, description) = row?;
        tree.taxonomies.push(AppliedTaxonomy {
            id: parse_uuid(&id)?,
            release_id: parse_uuid(&release)?,
            applied_typification_id: parse_uuid(&typ)?,
            original_id: original.as_deref().map(parse_uuid).transpose()?,
            title,
            description,
        });
    }

    let mut stmt = conn.prepare(
        "SELECT id, release_id, applied_taxonomy_id, original_id, title, description,
                feedback, fulfilled, score, entity_mapping
         FROM applied_branches WHERE release_id = ?1",
    )?;
    let rows = stmt.query_map(params![release], |row| {
        Ok(AppliedBranchRow {
            id: row.get::<_, String>(0)?,
            release_id: row.get::<_, String>(1)?,
            applied_taxonomy_id: row.get::<_, String>(2)?,
            original_id: row.get::<_, Option<String>>(3)?,
            title: row.get::<_, String>(4)?,
            description: row.get::<_, String>(5)?,
            feedback: row.get::<_, Option<String>>(6)?,
            fulfilled: row.get::<_, Option<i32>>(7)?,
            score: row.get::<_, Option<f64>>(8)?,
            entity_mapping: row.get::<_, Option<String>>(9)?,
        })
    })?;
    for row in rows {
        tree.branches.push(branch_from_row(row?)?);
    }

    Ok(tree)
}

struct AppliedBranchRow {
    id: String,
    release_id: String,
    applied_taxonomy_id: String,
    original_id: Option<String>,
    title: String,
    description: String,
    feedback: Option<String>,
    fulfilled: Option<i32>,
    score: Option<f64>,
    entity_mapping: Option<String>,
}

fn branch_from_row(row: AppliedBranchRow) -> Result<AppliedBranch, DatabaseError> {
    Ok(AppliedBranch {
        id: parse_uuid(&row.id)?,
        release_id: parse_uuid(&row.release_id)?,
        applied_taxonomy_id: parse_uuid(&row.applied_taxonomy_id)?,
        original_id: row.original_id.as_deref().map(parse_uuid).transpose()?,
        title: row.title,
        description: row.description,
        feedback: row.feedback,
        fulfilled: row.fulfilled.map(|f| f != 0),
        score: row.score,
        entity_mapping: row.entity_mapping,
    })
}
