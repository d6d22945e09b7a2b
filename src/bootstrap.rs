//! Startup routines.
//!
//! The default admin account is created by an explicit idempotent upsert
//! called from `main`, never as an import-time side effect. An existing
//! account is left untouched, so a changed admin password survives
//! restarts.

use rusqlite::Connection;
use uuid::Uuid;

use crate::auth::{self, AuthError};
use crate::db;
use crate::models::{RoleProfile, User};

pub const ADMIN_EMAIL: &str = "admin@urbancare.local";

/// Ensure the default admin account exists. Returns `true` when the
/// account was created on this call.
pub fn ensure_admin(conn: &Connection) -> Result<bool, AuthError> {
    if db::get_user_by_email(conn, ADMIN_EMAIL)?.is_some() {
        return Ok(false);
    }

    let password = std::env::var("URBANCARE_ADMIN_PASSWORD").unwrap_or_else(|_| {
        let generated = auth::generate_token();
        tracing::warn!(
            "URBANCARE_ADMIN_PASSWORD not set; generated admin password: {generated}"
        );
        generated
    });

    let now = chrono::Utc::now().naive_utc();
    let mut admin = User {
        id: Uuid::new_v4(),
        email: ADMIN_EMAIL.into(),
        password_hash: auth::hash_password(&password)?,
        first_name: "System".into(),
        last_name: "Administrator".into(),
        phone: None,
        is_active: true,
        email_verified: true,
        profile: RoleProfile::Admin,
        created_at: now,
        updated_at: now,
    };

    match db::insert_user(conn, &mut admin) {
        Ok(()) => {
            tracing::info!(user_id = %admin.id, "default admin account created");
            Ok(true)
        }
        // Lost a startup race against another process; the account exists
        Err(e) if e.is_unique_violation() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::UserRole;

    #[test]
    fn creates_admin_once() {
        let conn = open_memory_database().unwrap();
        assert!(ensure_admin(&conn).unwrap());
        assert!(!ensure_admin(&conn).unwrap());

        let admin = db::get_user_by_email(&conn, ADMIN_EMAIL).unwrap().unwrap();
        assert_eq!(admin.role(), UserRole::Admin);
        assert!(admin.is_active);
    }

    #[test]
    fn does_not_overwrite_changed_password() {
        let conn = open_memory_database().unwrap();
        ensure_admin(&conn).unwrap();

        let admin = db::get_user_by_email(&conn, ADMIN_EMAIL).unwrap().unwrap();
        let new_hash = auth::hash_password("rotated-by-operator").unwrap();
        db::set_password_hash(&conn, &admin.id, &new_hash).unwrap();

        assert!(!ensure_admin(&conn).unwrap());
        let after = db::get_user_by_email(&conn, ADMIN_EMAIL).unwrap().unwrap();
        assert!(auth::verify_password("rotated-by-operator", &after.password_hash));
    }
}
