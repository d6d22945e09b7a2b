//! User directory and profile endpoints.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiResponse, AuthContext};
use crate::authorization::{self, Capability};
use crate::db::{self, NewAuditEntry};
use crate::models::*;

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

/// Profile access: self, or staff/admin for others.
fn may_access_profile(caller: &AuthContext, target: &Uuid) -> bool {
    caller.user.id == *target
        || matches!(caller.user.role(), UserRole::Staff | UserRole::Admin)
}

/// Patient profiles are sensitive; every read and write through this
/// surface leaves one audit row.
fn audit_profile_access(
    conn: &rusqlite::Connection,
    caller: &AuthContext,
    target: &Uuid,
    action: AuditAction,
    outcome: AuditOutcome,
) -> Result<(), ApiError> {
    db::append_audit(
        conn,
        &NewAuditEntry {
            actor_id: caller.user.id,
            actor_role: caller.user.role(),
            action,
            resource: AuditResource::PatientProfile,
            resource_id: target.to_string(),
            outcome,
            client: caller.client.clone(),
        },
    )?;
    Ok(())
}

/// `GET /api/users/:id`
pub async fn profile(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserPublic>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let target = db::get_user(&conn, &id)?.ok_or(ApiError::NotFound("User not found".into()))?;

    let is_patient = target.role() == UserRole::Patient;
    if !may_access_profile(&caller, &id) {
        if is_patient {
            audit_profile_access(&conn, &caller, &id, AuditAction::Read, AuditOutcome::Denied)?;
        }
        return Err(ApiError::forbidden());
    }
    if is_patient {
        audit_profile_access(&conn, &caller, &id, AuditAction::Read, AuditOutcome::Success)?;
    }
    Ok(ApiResponse::data(target.public()))
}

/// `PUT /api/users/:id` — contact details only; role-specific fields and
/// the health card identifier are never client-writable here.
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserPublic>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let mut target = db::get_user(&conn, &id)?.ok_or(ApiError::NotFound("User not found".into()))?;

    let is_patient = target.role() == UserRole::Patient;
    if !may_access_profile(&caller, &id) {
        if is_patient {
            audit_profile_access(&conn, &caller, &id, AuditAction::Update, AuditOutcome::Denied)?;
        }
        return Err(ApiError::forbidden());
    }

    if let Some(first_name) = request.first_name {
        if first_name.trim().is_empty() {
            return Err(ApiError::BadRequest("First name cannot be empty".into()));
        }
        target.first_name = first_name.trim().to_string();
    }
    if let Some(last_name) = request.last_name {
        if last_name.trim().is_empty() {
            return Err(ApiError::BadRequest("Last name cannot be empty".into()));
        }
        target.last_name = last_name.trim().to_string();
    }
    if let Some(phone) = request.phone {
        target.phone = Some(phone);
    }
    target.updated_at = chrono::Utc::now().naive_utc();
    db::update_user(&conn, &target)?;

    if is_patient {
        audit_profile_access(&conn, &caller, &id, AuditAction::Update, AuditOutcome::Success)?;
    }
    Ok(ApiResponse::data(target.public()))
}

#[derive(Deserialize)]
pub struct ActiveRequest {
    pub is_active: bool,
}

/// `PATCH /api/users/:id/active` — enable or disable an account.
pub async fn set_active(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<ActiveRequest>,
) -> Result<Json<ApiResponse<UserPublic>>, ApiError> {
    authorization::require(caller.user.role(), Capability::ManageUsers)?;
    if id == caller.user.id {
        return Err(ApiError::BadRequest(
            "Cannot change your own account status".into(),
        ));
    }
    let conn = ctx.state.open_db()?;
    db::get_user(&conn, &id)?.ok_or(ApiError::NotFound("User not found".into()))?;
    db::set_user_active(&conn, &id, request.is_active)?;
    let updated = db::get_user(&conn, &id)?.ok_or(ApiError::NotFound("User not found".into()))?;
    tracing::info!(user_id = %id, is_active = request.is_active, "account status changed");
    Ok(ApiResponse::data(updated.public()))
}

/// `GET /api/users/doctors` — active doctors with specialization and fee.
pub async fn doctors(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
) -> Result<Json<ApiResponse<Vec<DoctorListing>>>, ApiError> {
    authorization::require(caller.user.role(), Capability::ViewDoctorDirectory)?;
    let conn = ctx.state.open_db()?;
    Ok(ApiResponse::data(db::list_doctors(&conn)?))
}

/// `GET /api/users/search?q=` — name/email search, staff and above.
pub async fn search(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<UserPublic>>>, ApiError> {
    authorization::require(caller.user.role(), Capability::SearchUsers)?;
    if query.q.trim().len() < 2 {
        return Err(ApiError::BadRequest(
            "Search term must be at least 2 characters".into(),
        ));
    }
    let conn = ctx.state.open_db()?;
    let found = db::search_users(&conn, query.q.trim())?
        .into_iter()
        .map(|u| u.public())
        .collect();
    Ok(ApiResponse::data(found))
}
