use rusqlite::{params, Connection};

/// Fire-and-forget audit sink. A failed audit write must never fail the
/// calling operation, so errors are logged and swallowed here.
pub fn record(
    conn: &Connection,
    action: &str,
    table: &str,
    record_id: &str,
    old_data: Option<&serde_json::Value>,
) {
    let now = chrono::Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string();
    let result = conn.execute(
        "INSERT INTO audit_log (action, table_name, record_id, old_data, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![action, table, record_id, old_data.map(|v| v.to_string()), now],
    );

    if let Err(e) = result {
        tracing::warn!(action, table, record_id, error = %e, "Audit write failed");
    }
}
