use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::release::{parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{PipelineRun, RunKind, RunStatus};

pub fn insert_run(conn: &Connection, run: &PipelineRun) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO pipeline_runs (id, kind, release_id, status, progress, error,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            run.id.to_string(),
            run.kind.as_str(),
            run.release_id.map(|id| id.to_string()),
            run.status.as_str(),
            run.progress,
            run.error,
            run.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            run.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_run(conn: &Connection, id: &Uuid) -> Result<Option<PipelineRun>, DatabaseError> {
    query_run(
        conn,
        "SELECT id, kind, release_id, status, progress, error, created_at, updated_at
         FROM pipeline_runs WHERE id = ?1",
        params![id.to_string()],
    )
}

/// Latest run for a release (a release normally has exactly one).
pub fn get_run_for_release(
    conn: &Connection,
    release_id: &Uuid,
) -> Result<Option<PipelineRun>, DatabaseError> {
    query_run(
        conn,
        "SELECT id, kind, release_id, status, progress, error, created_at, updated_at
         FROM pipeline_runs WHERE release_id = ?1 ORDER BY created_at DESC LIMIT 1",
        params![release_id.to_string()],
    )
}

/// Update status/progress/error in one statement. Only the run tracker may
/// call this; every other component reads.
pub fn update_run(
    conn: &Connection,
    run_id: &Uuid,
    status: RunStatus,
    progress: &str,
    error: Option<&str>,
) -> Result<(), DatabaseError> {
    let now = chrono::Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string();
    let rows = conn.execute(
        "UPDATE pipeline_runs SET status = ?2, progress = ?3, error = ?4, updated_at = ?5
         WHERE id = ?1",
        params![run_id.to_string(), status.as_str(), progress, error, now],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "PipelineRun".into(),
            id: run_id.to_string(),
        });
    }
    Ok(())
}

/// Attach the spawned release to a test run.
pub fn set_run_release(
    conn: &Connection,
    run_id: &Uuid,
    release_id: &Uuid,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE pipeline_runs SET release_id = ?2 WHERE id = ?1",
        params![run_id.to_string(), release_id.to_string()],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "PipelineRun".into(),
            id: run_id.to_string(),
        });
    }
    Ok(())
}

fn query_run(
    conn: &Connection,
    sql: &str,
    args: impl rusqlite::Params,
) -> Result<Option<PipelineRun>, DatabaseError> {
    let result = conn.query_row(sql, args, |row| {
        Ok(RunRow {
            id: row.get::<_, String>(0)?,
            kind: row.get::<_, String>(1)?,
            release_id: row.get::<_, Option<String>>(2)?,
            status: row.get::<_, String>(3)?,
            progress: row.get::<_, String>(4)?,
            error: row.get::<_, Option<String>>(5)?,
            created_at: row.get::<_, String>(6)?,
            updated_at: row.get::<_, String>(7)?,
        })
    });

    match result {
        Ok(row) => Ok(Some(run_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

struct RunRow {
    id: String,
    kind: String,
    release_id: Option<String>,
    status: String,
    progress: String,
    error: Option<String>,
    created_at: String,
    updated_at: String,
}

fn run_from_row(row: RunRow) -> Result<PipelineRun, DatabaseError> {
    Ok(PipelineRun {
        id: parse_uuid(&row.id)?,
        kind: RunKind::from_str(&row.kind)?,
        release_id: row.release_id.as_deref().map(parse_uuid).transpose()?,
        status: RunStatus::from_str(&row.status)?,
        progress: row.progress,
        error: row.error,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    })
}
