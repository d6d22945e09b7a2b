//! Credential and session layer.
//!
//! Passwords are stored as salted PBKDF2 hashes. Bearer tokens are opaque:
//! 32 random bytes handed to the client once, with only SHA-256 digests
//! persisted. A session carries an access token (24 h) and a refresh token
//! (30 d); one-time tokens cover email verification and password reset.

use base64::Engine;
use chrono::{Duration, NaiveDateTime};
use pbkdf2::password_hash::rand_core::OsRng;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::mailer::{Mailer, OutboundEmail};
use crate::models::*;

const ACCESS_TOKEN_TTL_HOURS: i64 = 24;
const REFRESH_TOKEN_TTL_DAYS: i64 = 30;
const RESET_TOKEN_TTL_HOURS: i64 = 1;
const VERIFY_TOKEN_TTL_HOURS: i64 = 48;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Token invalid or expired")]
    TokenInvalid,

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// One field-level validation failure, surfaced in the error envelope.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    #[serde(flatten)]
    pub profile: RoleProfile,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: NaiveDateTime,
}

// ── Password hashing ────────────────────────────────────────

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Pbkdf2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AuthError::InvalidCredentials)
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

// ── Token primitives ────────────────────────────────────────

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 digest of a token, base64-encoded for TEXT storage.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    base64::engine::general_purpose::STANDARD_NO_PAD.encode(digest)
}

fn digests_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

// ── Registration ────────────────────────────────────────────

pub fn register(
    conn: &rusqlite::Connection,
    mut request: RegisterRequest,
    mailer: &dyn Mailer,
) -> Result<User, AuthError> {
    let mut errors = Vec::new();
    request.email = request.email.trim().to_string();
    if !request.email.contains('@') || request.email.len() < 5 {
        errors.push(FieldError::new("email", "A valid email address is required"));
    }
    if request.password.len() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 8 characters",
        ));
    }
    if request.first_name.trim().is_empty() {
        errors.push(FieldError::new("first_name", "First name is required"));
    }
    if request.last_name.trim().is_empty() {
        errors.push(FieldError::new("last_name", "Last name is required"));
    }
    if request.profile.role() == UserRole::Admin {
        errors.push(FieldError::new("role", "Admin accounts cannot be self-registered"));
    }
    // Health cards are assigned by the system, never supplied by callers
    if let RoleProfile::Patient { health_card_id, .. } = &mut request.profile {
        *health_card_id = None;
    }
    if !errors.is_empty() {
        return Err(AuthError::Validation(errors));
    }

    let now = chrono::Utc::now().naive_utc();
    let mut user = User {
        id: Uuid::new_v4(),
        email: request.email,
        password_hash: hash_password(&request.password)?,
        first_name: request.first_name.trim().to_string(),
        last_name: request.last_name.trim().to_string(),
        phone: request.phone,
        is_active: true,
        email_verified: false,
        profile: request.profile,
        created_at: now,
        updated_at: now,
    };

    match db::insert_user(conn, &mut user) {
        Ok(()) => {}
        Err(e) if e.is_unique_violation() => {
            return Err(AuthError::Validation(vec![FieldError::new(
                "email",
                "An account with this email already exists",
            )]));
        }
        Err(e) => return Err(e.into()),
    }

    start_email_verification(conn, &user, mailer)?;
    tracing::info!(user_id = %user.id, role = user.role().as_str(), "account registered");
    Ok(user)
}

// ── Login / sessions ────────────────────────────────────────

pub fn login(
    conn: &rusqlite::Connection,
    email: &str,
    password: &str,
) -> Result<(User, TokenPair), AuthError> {
    let user = db::get_user_by_email(conn, email)?.ok_or(AuthError::InvalidCredentials)?;
    if !verify_password(password, &user.password_hash) {
        return Err(AuthError::InvalidCredentials);
    }
    if !user.is_active {
        return Err(AuthError::AccountDisabled);
    }
    let pair = issue_session(conn, &user.id)?;
    tracing::info!(user_id = %user.id, "login");
    Ok((user, pair))
}

fn issue_session(conn: &rusqlite::Connection, user_id: &Uuid) -> Result<TokenPair, AuthError> {
    let now = chrono::Utc::now().naive_utc();
    let access_token = generate_token();
    let refresh_token = generate_token();
    let access_expires_at = now + Duration::hours(ACCESS_TOKEN_TTL_HOURS);

    db::insert_session(
        conn,
        &db::Session {
            id: Uuid::new_v4(),
            user_id: *user_id,
            access_hash: hash_token(&access_token),
            refresh_hash: hash_token(&refresh_token),
            access_expires_at,
            refresh_expires_at: now + Duration::days(REFRESH_TOKEN_TTL_DAYS),
            created_at: now,
        },
    )?;

    Ok(TokenPair {
        access_token,
        refresh_token,
        access_expires_at,
    })
}

/// Resolve a bearer token to its account. Expired sessions and disabled
/// accounts both read as an invalid token.
pub fn authenticate(conn: &rusqlite::Connection, token: &str) -> Result<User, AuthError> {
    let digest = hash_token(token);
    let session =
        db::find_session_by_access_hash(conn, &digest)?.ok_or(AuthError::TokenInvalid)?;
    if !digests_match(&session.access_hash, &digest) {
        return Err(AuthError::TokenInvalid);
    }
    if session.access_expires_at < chrono::Utc::now().naive_utc() {
        return Err(AuthError::TokenInvalid);
    }
    let user = db::get_user(conn, &session.user_id)?.ok_or(AuthError::TokenInvalid)?;
    if !user.is_active {
        return Err(AuthError::AccountDisabled);
    }
    Ok(user)
}

/// Exchange a refresh token for a fresh pair; the old pair stops working.
pub fn refresh(conn: &rusqlite::Connection, refresh_token: &str) -> Result<TokenPair, AuthError> {
    let digest = hash_token(refresh_token);
    let session =
        db::find_session_by_refresh_hash(conn, &digest)?.ok_or(AuthError::TokenInvalid)?;
    let now = chrono::Utc::now().naive_utc();
    if session.refresh_expires_at < now {
        return Err(AuthError::TokenInvalid);
    }

    let access_token = generate_token();
    let new_refresh = generate_token();
    let access_expires_at = now + Duration::hours(ACCESS_TOKEN_TTL_HOURS);
    db::rotate_session(
        conn,
        &session.id,
        &hash_token(&access_token),
        &hash_token(&new_refresh),
        access_expires_at,
        now + Duration::days(REFRESH_TOKEN_TTL_DAYS),
    )?;

    Ok(TokenPair {
        access_token,
        refresh_token: new_refresh,
        access_expires_at,
    })
}

pub fn logout(conn: &rusqlite::Connection, token: &str) -> Result<(), AuthError> {
    let digest = hash_token(token);
    if let Some(session) = db::find_session_by_access_hash(conn, &digest)? {
        db::delete_session(conn, &session.id)?;
    }
    Ok(())
}

// ── One-time token flows ────────────────────────────────────

fn start_email_verification(
    conn: &rusqlite::Connection,
    user: &User,
    mailer: &dyn Mailer,
) -> Result<(), AuthError> {
    let token = generate_token();
    db::insert_auth_token(
        conn,
        &user.id,
        &hash_token(&token),
        TokenPurpose::EmailVerify,
        chrono::Utc::now().naive_utc() + Duration::hours(VERIFY_TOKEN_TTL_HOURS),
    )?;
    let _ = mailer.send(&OutboundEmail {
        to: user.email.clone(),
        subject: "Verify your UrbanCare account".into(),
        body: format!(
            "Hello {}, confirm your email with this code: {token}",
            user.first_name
        ),
    });
    Ok(())
}

pub fn verify_email(conn: &rusqlite::Connection, token: &str) -> Result<(), AuthError> {
    let now = chrono::Utc::now().naive_utc();
    let user_id = db::consume_auth_token(conn, &hash_token(token), TokenPurpose::EmailVerify, now)?
        .ok_or(AuthError::TokenInvalid)?;
    db::set_email_verified(conn, &user_id)?;
    Ok(())
}

/// Issue a reset token when the account exists. The response is identical
/// either way — callers cannot probe for registered addresses.
pub fn start_password_reset(
    conn: &rusqlite::Connection,
    email: &str,
    mailer: &dyn Mailer,
) -> Result<(), AuthError> {
    if let Some(user) = db::get_user_by_email(conn, email)? {
        let token = generate_token();
        db::insert_auth_token(
            conn,
            &user.id,
            &hash_token(&token),
            TokenPurpose::PasswordReset,
            chrono::Utc::now().naive_utc() + Duration::hours(RESET_TOKEN_TTL_HOURS),
        )?;
        let _ = mailer.send(&OutboundEmail {
            to: user.email.clone(),
            subject: "UrbanCare password reset".into(),
            body: format!("Use this code to reset your password: {token}"),
        });
    }
    Ok(())
}

pub fn reset_password(
    conn: &rusqlite::Connection,
    token: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    if new_password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(vec![FieldError::new(
            "password",
            "Password must be at least 8 characters",
        )]));
    }
    let now = chrono::Utc::now().naive_utc();
    let user_id =
        db::consume_auth_token(conn, &hash_token(token), TokenPurpose::PasswordReset, now)?
            .ok_or(AuthError::TokenInvalid)?;
    db::set_password_hash(conn, &user_id, &hash_password(new_password)?)?;
    tracing::info!(user_id = %user_id, "password reset completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::mailer::testing::CapturingMailer;
    use chrono::NaiveDate;

    fn patient_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: "correct-horse".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            phone: None,
            profile: RoleProfile::Patient {
                date_of_birth: NaiveDate::from_ymd_opt(1992, 7, 4).unwrap(),
                blood_type: "O-".into(),
                health_card_id: None,
            },
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter22-hunter22").unwrap();
        assert!(verify_password("hunter22-hunter22", &hash));
        assert!(!verify_password("wrong-password", &hash));
        // Salted: two hashes of the same input differ
        let hash2 = hash_password("hunter22-hunter22").unwrap();
        assert_ne!(hash, hash2);
    }

    #[test]
    fn generated_tokens_unique_and_digest_deterministic() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
        assert_eq!(hash_token(&t1), hash_token(&t1));
        assert_ne!(hash_token(&t1), hash_token(&t2));
    }

    #[test]
    fn register_then_login() {
        let conn = open_memory_database().unwrap();
        let mailer = CapturingMailer::default();
        let user = register(&conn, patient_request("jane@x.com"), &mailer).unwrap();
        assert!(user.profile.health_card_id().is_some());
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);

        let (logged_in, pair) = login(&conn, "jane@x.com", "correct-horse").unwrap();
        assert_eq!(logged_in.id, user.id);

        let authed = authenticate(&conn, &pair.access_token).unwrap();
        assert_eq!(authed.id, user.id);
    }

    #[test]
    fn duplicate_email_is_field_level_validation_error() {
        let conn = open_memory_database().unwrap();
        let mailer = CapturingMailer::default();
        register(&conn, patient_request("jane@x.com"), &mailer).unwrap();
        let err = register(&conn, patient_request("jane@x.com"), &mailer).unwrap_err();
        match err {
            AuthError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "email");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn register_rejects_short_password_and_admin_role() {
        let conn = open_memory_database().unwrap();
        let mailer = CapturingMailer::default();
        let mut bad = patient_request("short@x.com");
        bad.password = "short".into();
        assert!(matches!(
            register(&conn, bad, &mailer),
            Err(AuthError::Validation(_))
        ));

        let admin = RegisterRequest {
            email: "root@x.com".into(),
            password: "long-enough-pw".into(),
            first_name: "Root".into(),
            last_name: "User".into(),
            phone: None,
            profile: RoleProfile::Admin,
        };
        assert!(matches!(
            register(&conn, admin, &mailer),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn login_rejects_wrong_password_and_disabled_account() {
        let conn = open_memory_database().unwrap();
        let mailer = CapturingMailer::default();
        let user = register(&conn, patient_request("jane@x.com"), &mailer).unwrap();

        assert!(matches!(
            login(&conn, "jane@x.com", "not-the-password"),
            Err(AuthError::InvalidCredentials)
        ));

        conn.execute(
            "UPDATE users SET is_active = 0 WHERE id = ?1",
            rusqlite::params![user.id.to_string()],
        )
        .unwrap();
        assert!(matches!(
            login(&conn, "jane@x.com", "correct-horse"),
            Err(AuthError::AccountDisabled)
        ));
    }

    #[test]
    fn authenticate_rejects_garbage_token() {
        let conn = open_memory_database().unwrap();
        assert!(matches!(
            authenticate(&conn, "not-a-real-token"),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn refresh_rotates_and_invalidates_old_access() {
        let conn = open_memory_database().unwrap();
        let mailer = CapturingMailer::default();
        register(&conn, patient_request("jane@x.com"), &mailer).unwrap();
        let (_, pair) = login(&conn, "jane@x.com", "correct-horse").unwrap();

        let new_pair = refresh(&conn, &pair.refresh_token).unwrap();
        assert!(authenticate(&conn, &new_pair.access_token).is_ok());
        assert!(matches!(
            authenticate(&conn, &pair.access_token),
            Err(AuthError::TokenInvalid)
        ));
        // Old refresh token is spent too
        assert!(matches!(
            refresh(&conn, &pair.refresh_token),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn logout_ends_session() {
        let conn = open_memory_database().unwrap();
        let mailer = CapturingMailer::default();
        register(&conn, patient_request("jane@x.com"), &mailer).unwrap();
        let (_, pair) = login(&conn, "jane@x.com", "correct-horse").unwrap();

        logout(&conn, &pair.access_token).unwrap();
        assert!(matches!(
            authenticate(&conn, &pair.access_token),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn email_verification_flow() {
        let conn = open_memory_database().unwrap();
        let mailer = CapturingMailer::default();
        let user = register(&conn, patient_request("jane@x.com"), &mailer).unwrap();
        assert!(!user.email_verified);

        // Pull the code out of the captured email body
        let body = mailer.sent.lock().unwrap()[0].body.clone();
        let token = body.rsplit(' ').next().unwrap().to_string();

        verify_email(&conn, &token).unwrap();
        let after = db::get_user(&conn, &user.id).unwrap().unwrap();
        assert!(after.email_verified);

        // One-time: replay fails
        assert!(matches!(
            verify_email(&conn, &token),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn password_reset_flow() {
        let conn = open_memory_database().unwrap();
        let mailer = CapturingMailer::default();
        register(&conn, patient_request("jane@x.com"), &mailer).unwrap();

        start_password_reset(&conn, "jane@x.com", &mailer).unwrap();
        let body = mailer.sent.lock().unwrap()[1].body.clone();
        let token = body.rsplit(' ').next().unwrap().to_string();

        reset_password(&conn, &token, "brand-new-password").unwrap();
        assert!(login(&conn, "jane@x.com", "brand-new-password").is_ok());
        assert!(matches!(
            login(&conn, "jane@x.com", "correct-horse"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn password_reset_does_not_reveal_unknown_emails() {
        let conn = open_memory_database().unwrap();
        let mailer = CapturingMailer::default();
        // Unknown address: still Ok, nothing sent
        start_password_reset(&conn, "ghost@x.com", &mailer).unwrap();
        assert!(mailer.sent.lock().unwrap().is_empty());
    }
}
