use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;

/// Everything needed to append one audit row; the id and timestamp are
/// assigned at write time.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub actor_id: Uuid,
    pub actor_role: UserRole,
    pub action: AuditAction,
    pub resource: AuditResource,
    pub resource_id: String,
    pub outcome: AuditOutcome,
    pub client: ClientMeta,
}

/// Append one entry to the audit log. There is deliberately no update or
/// delete counterpart anywhere in this module.
pub fn append_audit(conn: &Connection, entry: &NewAuditEntry) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (timestamp, actor_id, actor_role, action, resource_type,
                                resource_id, outcome, ip_address, user_agent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            chrono::Utc::now().naive_utc(),
            entry.actor_id.to_string(),
            entry.actor_role.as_str(),
            entry.action.as_str(),
            entry.resource.as_str(),
            entry.resource_id,
            entry.outcome.as_str(),
            entry.client.ip_address,
            entry.client.user_agent,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Audit trail for one resource, in append order.
pub fn list_audit_for_resource(
    conn: &Connection,
    resource: AuditResource,
    resource_id: &str,
) -> Result<Vec<AuditEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, timestamp, actor_id, actor_role, action, resource_type, resource_id,
                outcome, ip_address, user_agent
         FROM audit_log WHERE resource_type = ?1 AND resource_id = ?2
         ORDER BY id",
    )?;
    let rows = stmt.query_map(params![resource.as_str(), resource_id], map_audit_row)?;
    rows.map(|r| r.map_err(DatabaseError::from).and_then(entry_from_raw))
        .collect()
}

pub fn count_audit_entries(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
    Ok(count)
}

struct AuditRaw {
    id: i64,
    timestamp: chrono::NaiveDateTime,
    actor_id: String,
    actor_role: String,
    action: String,
    resource: String,
    resource_id: String,
    outcome: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

fn map_audit_row(row: &Row<'_>) -> rusqlite::Result<AuditRaw> {
    Ok(AuditRaw {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        actor_id: row.get(2)?,
        actor_role: row.get(3)?,
        action: row.get(4)?,
        resource: row.get(5)?,
        resource_id: row.get(6)?,
        outcome: row.get(7)?,
        ip_address: row.get(8)?,
        user_agent: row.get(9)?,
    })
}

fn entry_from_raw(r: AuditRaw) -> Result<AuditEntry, DatabaseError> {
    Ok(AuditEntry {
        id: r.id,
        timestamp: r.timestamp,
        actor_id: Uuid::parse_str(&r.actor_id).unwrap_or_default(),
        actor_role: r.actor_role.parse()?,
        action: r.action.parse()?,
        resource: r.resource.parse()?,
        resource_id: r.resource_id,
        outcome: r.outcome.parse()?,
        ip_address: r.ip_address,
        user_agent: r.user_agent,
    })
}
