use rusqlite::{params, Connection};
use uuid::Uuid;

use super::release::{parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{Branch, Document, SourceRecord, Taxonomy, Typification};

pub fn insert_document(conn: &Connection, document: &Document) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO documents (id, title, created_at) VALUES (?1, ?2, ?3)",
        params![
            document.id.to_string(),
            document.title,
            document.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_document(conn: &Connection, id: &Uuid) -> Result<Option<Document>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, title, created_at FROM documents WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    );

    match result {
        Ok((id, title, created_at)) => Ok(Some(Document {
            id: parse_uuid(&id)?,
            title,
            created_at: parse_timestamp(&created_at),
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_typification(conn: &Connection, typ: &Typification) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO typifications (id, name, deleted) VALUES (?1, ?2, ?3)",
        params![typ.id.to_string(), typ.name, typ.deleted as i32],
    )?;
    Ok(())
}

pub fn insert_taxonomy(conn: &Connection, taxonomy: &Taxonomy) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO taxonomies (id, typification_id, title, description) VALUES (?1, ?2, ?3, ?4)",
        params![
            taxonomy.id.to_string(),
            taxonomy.typification_id.to_string(),
            taxonomy.title,
            taxonomy.description,
        ],
    )?;
    Ok(())
}

pub fn insert_branch(conn: &Connection, branch: &Branch) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO branches (id, taxonomy_id, title, description) VALUES (?1, ?2, ?3, ?4)",
        params![
            branch.id.to_string(),
            branch.taxonomy_id.to_string(),
            branch.title,
            branch.description,
        ],
    )?;
    Ok(())
}

pub fn insert_source(conn: &Connection, source: &SourceRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sources (id, name, description) VALUES (?1, ?2, ?3)",
        params![source.id.to_string(), source.name, source.description],
    )?;
    Ok(())
}

pub fn link_document_typification(
    conn: &Connection,
    document_id: &Uuid,
    typification_id: &Uuid,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO document_typifications (document_id, typification_id) VALUES (?1, ?2)",
        params![document_id.to_string(), typification_id.to_string()],
    )?;
    Ok(())
}

pub fn link_typification_source(
    conn: &Connection,
    typification_id: &Uuid,
    source_id: &Uuid,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO typification_sources (typification_id, source_id) VALUES (?1, ?2)",
        params![typification_id.to_string(), source_id.to_string()],
    )?;
    Ok(())
}

pub fn link_taxonomy_source(
    conn: &Connection,
    taxonomy_id: &Uuid,
    source_id: &Uuid,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO taxonomy_sources (taxonomy_id, source_id) VALUES (?1, ?2)",
        params![taxonomy_id.to_string(), source_id.to_string()],
    )?;
    Ok(())
}

/// One branch plus its enclosing hierarchy, as returned by the evaluation
/// scope query.
#[derive(Debug, Clone)]
pub struct BranchWithAncestry {
    pub branch: Branch,
    pub taxonomy: Taxonomy,
    pub typification: Typification,
}

/// Every branch that applies to a document, via the document's
/// typifications. Deleted typifications are excluded.
pub fn branches_for_document(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Vec<BranchWithAncestry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.taxonomy_id, b.title, b.description,
                tx.id, tx.typification_id, tx.title, tx.description,
                tp.id, tp.name, tp.deleted
         FROM document_typifications dt
         JOIN typifications tp ON tp.id = dt.typification_id AND tp.deleted = 0
         JOIN taxonomies tx ON tx.typification_id = tp.id
         JOIN branches b ON b.taxonomy_id = tx.id
         WHERE dt.document_id = ?1
         ORDER BY tp.name, tx.title, b.title",
    )?;

    let rows = stmt.query_map(params![document_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
            row.get::<_, String>(8)?,
            row.get::<_, String>(9)?,
            row.get::<_, i32>(10)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (b_id, b_tax, b_title, b_desc, tx_id, tx_typ, tx_title, tx_desc, tp_id, tp_name, tp_del) =
            row?;
        out.push(BranchWithAncestry {
            branch: Branch {
                id: parse_uuid(&b_id)?,
                taxonomy_id: parse_uuid(&b_tax)?,
                title: b_title,
                description: b_desc,
            },
            taxonomy: Taxonomy {
                id: parse_uuid(&tx_id)?,
                typification_id: parse_uuid(&tx_typ)?,
                title: tx_title,
                description: tx_desc,
            },
            typification: Typification {
                id: parse_uuid(&tp_id)?,
                name: tp_name,
                deleted: tp_del != 0,
            },
        });
    }
    Ok(out)
}

/// All registered sources (used for prompt display).
pub fn list_sources(conn: &Connection) -> Result<Vec<SourceRecord>, DatabaseError> {
    query_sources(
        conn,
        "SELECT id, name, description FROM sources ORDER BY name",
        &[],
    )
}

/// Sources linked to one typification.
pub fn sources_for_typification(
    conn: &Connection,
    typification_id: &Uuid,
) -> Result<Vec<SourceRecord>, DatabaseError> {
    query_sources(
        conn,
        "SELECT s.id, s.name, s.description FROM sources s
         JOIN typification_sources ts ON ts.source_id = s.id
         WHERE ts.typification_id = ?1 ORDER BY s.name",
        &[&typification_id.to_string()],
    )
}

/// Sources linked to one taxonomy.
pub fn sources_for_taxonomy(
    conn: &Connection,
    taxonomy_id: &Uuid,
) -> Result<Vec<SourceRecord>, DatabaseError> {
    query_sources(
        conn,
        "SELECT s.id, s.name, s.description FROM sources s
         JOIN taxonomy_sources ts ON ts.source_id = s.id
         WHERE ts.taxonomy_id = ?1 ORDER BY s.name",
        &[&taxonomy_id.to_string()],
    )
}

fn query_sources(
    conn: &Connection,
    sql: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<SourceRecord>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(args, |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
        ))
    })?;

    let mut sources = Vec::new();
    for row in rows {
        let (id, name, description) = row?;
        sources.push(SourceRecord {
            id: parse_uuid(&id)?,
            name,
            description,
        });
    }
    Ok(sources)
}
