use chrono::Datelike;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone, role, \
     is_active, email_verified, health_card_id, date_of_birth, blood_type, \
     specialization, consultation_fee, department, created_at, updated_at";

/// Insert a new account. Patient accounts without a health-card id are
/// assigned one here — exactly once, before the row is written.
pub fn insert_user(conn: &Connection, user: &mut User) -> Result<(), DatabaseError> {
    if let RoleProfile::Patient { health_card_id, .. } = &mut user.profile {
        if health_card_id.is_none() {
            *health_card_id = Some(generate_health_card_id(conn)?);
        }
    }

    let (dob, blood, spec, fee, dept) = profile_columns(&user.profile);
    conn.execute(
        "INSERT INTO users (id, email, password_hash, first_name, last_name, phone, role,
                            is_active, email_verified, health_card_id, date_of_birth,
                            blood_type, specialization, consultation_fee, department,
                            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            user.id.to_string(),
            user.email,
            user.password_hash,
            user.first_name,
            user.last_name,
            user.phone,
            user.role().as_str(),
            user.is_active,
            user.email_verified,
            user.profile.health_card_id(),
            dob,
            blood,
            spec,
            fee,
            dept,
            user.created_at,
            user.updated_at,
        ],
    )?;
    Ok(())
}

/// Update mutable profile fields. Role and health-card id are never touched.
pub fn update_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    let (dob, blood, spec, fee, dept) = profile_columns(&user.profile);
    let changed = conn.execute(
        "UPDATE users SET first_name = ?1, last_name = ?2, phone = ?3,
                          date_of_birth = ?4, blood_type = ?5, specialization = ?6,
                          consultation_fee = ?7, department = ?8, updated_at = ?9
         WHERE id = ?10",
        params![
            user.first_name,
            user.last_name,
            user.phone,
            dob,
            blood,
            spec,
            fee,
            dept,
            chrono::Utc::now().naive_utc(),
            user.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "user".into(),
            id: user.id.to_string(),
        });
    }
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
    let row = stmt
        .query_row(params![id.to_string()], map_user_row)
        .optional()?;
    row.map(User::try_from).transpose()
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE"
    ))?;
    let row = stmt.query_row(params![email], map_user_row).optional()?;
    row.map(User::try_from).transpose()
}

pub fn set_password_hash(
    conn: &Connection,
    id: &Uuid,
    password_hash: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
        params![
            password_hash,
            chrono::Utc::now().naive_utc(),
            id.to_string()
        ],
    )?;
    Ok(())
}

/// Enable or disable an account. Disabled accounts fail login and token
/// authentication.
pub fn set_user_active(
    conn: &Connection,
    id: &Uuid,
    is_active: bool,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
        params![
            is_active,
            chrono::Utc::now().naive_utc(),
            id.to_string()
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "user".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn set_email_verified(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE users SET email_verified = 1, updated_at = ?1 WHERE id = ?2",
        params![chrono::Utc::now().naive_utc(), id.to_string()],
    )?;
    Ok(())
}

/// Active doctors for the public directory, ordered by name.
pub fn list_doctors(conn: &Connection) -> Result<Vec<DoctorListing>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, first_name, last_name, specialization, consultation_fee, department
         FROM users WHERE role = 'doctor' AND is_active = 1
         ORDER BY last_name, first_name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(DoctorListing {
            id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_default(),
            name: format!("{} {}", row.get::<_, String>(1)?, row.get::<_, String>(2)?),
            specialization: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            consultation_fee: row.get::<_, Option<f64>>(4)?.unwrap_or_default(),
            department: row.get(5)?,
        })
    })?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Name/email substring search across accounts.
pub fn search_users(conn: &Connection, query: &str) -> Result<Vec<User>, DatabaseError> {
    let pattern = format!("%{}%", query.trim());
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE first_name LIKE ?1 OR last_name LIKE ?1 OR email LIKE ?1
         ORDER BY last_name, first_name LIMIT 50"
    ))?;
    let rows = stmt.query_map(params![pattern], map_user_row)?;
    rows.map(|r| {
        r.map_err(DatabaseError::from)
            .and_then(User::try_from)
    })
    .collect()
}

pub fn list_users_by_role(conn: &Connection, role: UserRole) -> Result<Vec<User>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE role = ?1 ORDER BY created_at"
    ))?;
    let rows = stmt.query_map(params![role.as_str()], map_user_row)?;
    rows.map(|r| {
        r.map_err(DatabaseError::from)
            .and_then(User::try_from)
    })
    .collect()
}

// ── Row mapping ─────────────────────────────────────────────

/// Raw row shape; converted to the typed [`User`] after the query so that
/// role-field integrity failures surface as database errors, not panics.
pub(crate) struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    role: String,
    is_active: bool,
    email_verified: bool,
    health_card_id: Option<String>,
    date_of_birth: Option<chrono::NaiveDate>,
    blood_type: Option<String>,
    specialization: Option<String>,
    consultation_fee: Option<f64>,
    department: Option<String>,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
}

pub(crate) fn map_user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        phone: row.get(5)?,
        role: row.get(6)?,
        is_active: row.get(7)?,
        email_verified: row.get(8)?,
        health_card_id: row.get(9)?,
        date_of_birth: row.get(10)?,
        blood_type: row.get(11)?,
        specialization: row.get(12)?,
        consultation_fee: row.get(13)?,
        department: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

impl TryFrom<UserRow> for User {
    type Error = DatabaseError;

    fn try_from(r: UserRow) -> Result<Self, DatabaseError> {
        let role: UserRole = r.role.parse()?;
        let missing = |field: &str| {
            DatabaseError::ConstraintViolation(format!(
                "user {} is missing mandatory {field} for role {}",
                r.id, role.as_str()
            ))
        };
        let profile = match role {
            UserRole::Patient => RoleProfile::Patient {
                date_of_birth: r.date_of_birth.ok_or_else(|| missing("date_of_birth"))?,
                blood_type: r.blood_type.ok_or_else(|| missing("blood_type"))?,
                health_card_id: r.health_card_id,
            },
            UserRole::Doctor => RoleProfile::Doctor {
                specialization: r.specialization.ok_or_else(|| missing("specialization"))?,
                consultation_fee: r.consultation_fee.ok_or_else(|| missing("consultation_fee"))?,
                department: r.department,
            },
            UserRole::Staff => RoleProfile::Staff {
                department: r.department.ok_or_else(|| missing("department"))?,
            },
            UserRole::Manager => RoleProfile::Manager {
                department: r.department.ok_or_else(|| missing("department"))?,
            },
            UserRole::Admin => RoleProfile::Admin,
        };
        Ok(User {
            id: Uuid::parse_str(&r.id).unwrap_or_default(),
            email: r.email,
            password_hash: r.password_hash,
            first_name: r.first_name,
            last_name: r.last_name,
            phone: r.phone,
            is_active: r.is_active,
            email_verified: r.email_verified,
            profile,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn profile_columns(
    profile: &RoleProfile,
) -> (
    Option<chrono::NaiveDate>,
    Option<&str>,
    Option<&str>,
    Option<f64>,
    Option<&str>,
) {
    match profile {
        RoleProfile::Patient {
            date_of_birth,
            blood_type,
            ..
        } => (Some(*date_of_birth), Some(blood_type.as_str()), None, None, None),
        RoleProfile::Doctor {
            specialization,
            consultation_fee,
            department,
        } => (
            None,
            None,
            Some(specialization.as_str()),
            Some(*consultation_fee),
            department.as_deref(),
        ),
        RoleProfile::Staff { department } | RoleProfile::Manager { department } => {
            (None, None, None, None, Some(department.as_str()))
        }
        RoleProfile::Admin => (None, None, None, None, None),
    }
}

/// Generate a unique human-readable health card id, e.g. `HC-2026-048213`.
fn generate_health_card_id(conn: &Connection) -> Result<String, DatabaseError> {
    let year = chrono::Utc::now().year();
    let mut rng = rand::thread_rng();
    loop {
        let candidate = format!("HC-{year}-{:06}", rng.gen_range(0..1_000_000u32));
        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE health_card_id = ?1)",
            params![candidate],
            |row| row.get(0),
        )?;
        if !taken {
            return Ok(candidate);
        }
    }
}
