use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::TokenPurpose;

/// A login session. Only SHA-256 digests of the bearer tokens are stored;
/// the tokens themselves exist only in the client's hands.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub access_hash: String,
    pub refresh_hash: String,
    pub access_expires_at: NaiveDateTime,
    pub refresh_expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

pub fn insert_session(conn: &Connection, session: &Session) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sessions (id, user_id, access_hash, refresh_hash,
                               access_expires_at, refresh_expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            session.id.to_string(),
            session.user_id.to_string(),
            session.access_hash,
            session.refresh_hash,
            session.access_expires_at,
            session.refresh_expires_at,
            session.created_at,
        ],
    )?;
    Ok(())
}

pub fn find_session_by_access_hash(
    conn: &Connection,
    access_hash: &str,
) -> Result<Option<Session>, DatabaseError> {
    find_session(conn, "access_hash", access_hash)
}

pub fn find_session_by_refresh_hash(
    conn: &Connection,
    refresh_hash: &str,
) -> Result<Option<Session>, DatabaseError> {
    find_session(conn, "refresh_hash", refresh_hash)
}

fn find_session(
    conn: &Connection,
    column: &str,
    hash: &str,
) -> Result<Option<Session>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, user_id, access_hash, refresh_hash, access_expires_at,
                refresh_expires_at, created_at
         FROM sessions WHERE {column} = ?1"
    ))?;
    let session = stmt
        .query_row(params![hash], |row| {
            Ok(Session {
                id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_default(),
                user_id: Uuid::parse_str(&row.get::<_, String>(1)?).unwrap_or_default(),
                access_hash: row.get(2)?,
                refresh_hash: row.get(3)?,
                access_expires_at: row.get(4)?,
                refresh_expires_at: row.get(5)?,
                created_at: row.get(6)?,
            })
        })
        .optional()?;
    Ok(session)
}

/// Replace a session's token digests (refresh flow).
pub fn rotate_session(
    conn: &Connection,
    id: &Uuid,
    access_hash: &str,
    refresh_hash: &str,
    access_expires_at: NaiveDateTime,
    refresh_expires_at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE sessions SET access_hash = ?1, refresh_hash = ?2,
                             access_expires_at = ?3, refresh_expires_at = ?4
         WHERE id = ?5",
        params![
            access_hash,
            refresh_hash,
            access_expires_at,
            refresh_expires_at,
            id.to_string()
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "session".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn delete_session(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM sessions WHERE id = ?1", params![id.to_string()])?;
    Ok(())
}

/// Drop expired sessions; returns how many were removed.
pub fn prune_expired_sessions(
    conn: &Connection,
    now: NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM sessions WHERE refresh_expires_at < ?1",
        params![now],
    )?;
    Ok(deleted)
}

// ── One-time tokens (email verification, password reset) ────

pub fn insert_auth_token(
    conn: &Connection,
    user_id: &Uuid,
    token_hash: &str,
    purpose: TokenPurpose,
    expires_at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO auth_tokens (id, user_id, token_hash, purpose, expires_at, consumed, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![
            Uuid::new_v4().to_string(),
            user_id.to_string(),
            token_hash,
            purpose.as_str(),
            expires_at,
            chrono::Utc::now().naive_utc(),
        ],
    )?;
    Ok(())
}

/// Consume a one-time token: valid, unexpired, and unused. Returns the owning
/// user id, or `None` when the token is unknown, stale, or already spent.
pub fn consume_auth_token(
    conn: &Connection,
    token_hash: &str,
    purpose: TokenPurpose,
    now: NaiveDateTime,
) -> Result<Option<Uuid>, DatabaseError> {
    let found: Option<(String, String)> = conn
        .query_row(
            "SELECT id, user_id FROM auth_tokens
             WHERE token_hash = ?1 AND purpose = ?2 AND consumed = 0 AND expires_at > ?3",
            params![token_hash, purpose.as_str(), now],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match found {
        Some((id, user_id)) => {
            conn.execute(
                "UPDATE auth_tokens SET consumed = 1 WHERE id = ?1",
                params![id],
            )?;
            Ok(Some(Uuid::parse_str(&user_id).unwrap_or_default()))
        }
        None => Ok(None),
    }
}
