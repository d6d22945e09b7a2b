//! Appointment endpoints: role-scoped listing, booking, status lifecycle,
//! and doctor availability.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiResponse, AuthContext};
use crate::authorization::{self, Capability};
use crate::db;
use crate::models::*;
use crate::scheduling::{self, BookingRequest};

#[derive(Deserialize)]
pub struct CreateAppointmentRequest {
    /// Ignored for patient callers, who always book for themselves.
    pub patient_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u16,
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
}

/// Narrow a filter to what the caller's role may see.
fn scope_filter(caller: &AuthContext, mut filter: AppointmentFilter) -> AppointmentFilter {
    match caller.user.role() {
        UserRole::Patient => filter.patient_id = Some(caller.user.id),
        UserRole::Doctor => filter.doctor_id = Some(caller.user.id),
        UserRole::Staff | UserRole::Manager | UserRole::Admin => {}
    }
    filter
}

/// `GET /api/appointments`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Query(filter): Query<AppointmentFilter>,
) -> Result<Json<ApiResponse<Vec<AppointmentView>>>, ApiError> {
    let role = caller.user.role();
    if !authorization::allowed(role, Capability::ViewOwnAppointments)
        && !authorization::allowed(role, Capability::ViewAllAppointments)
    {
        return Err(ApiError::forbidden());
    }
    let conn = ctx.state.open_db()?;
    let views = db::list_appointment_views(&conn, &scope_filter(&caller, filter))?;
    Ok(ApiResponse::data(views))
}

/// `POST /api/appointments`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiResponse<Appointment>>, ApiError> {
    authorization::require(caller.user.role(), Capability::BookAppointment)?;

    let patient_id = match caller.user.role() {
        UserRole::Patient => caller.user.id,
        _ => request
            .patient_id
            .ok_or(ApiError::BadRequest("patient_id is required".into()))?,
    };

    let booking = BookingRequest {
        patient_id,
        doctor_id: request.doctor_id,
        date: request.date,
        start_time: request.start_time,
        duration_minutes: request.duration_minutes,
        reason: request.reason,
    };
    let mut conn = ctx.state.open_db()?;
    let appointment = scheduling::book_appointment(&mut conn, &booking, Some(caller.user.id))?;

    ctx.state.notifier.notify_appointment(&appointment);
    Ok(ApiResponse::message(appointment, "Appointment scheduled."))
}

/// `GET /api/appointments/:id` — participants and staff/admin only.
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Appointment>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let appointment =
        db::get_appointment(&conn, &id)?.ok_or(ApiError::NotFound("Appointment not found".into()))?;

    let is_participant =
        appointment.patient_id == caller.user.id || appointment.doctor_id == caller.user.id;
    if !is_participant
        && !authorization::allowed(caller.user.role(), Capability::ViewAllAppointments)
    {
        return Err(ApiError::forbidden());
    }
    Ok(ApiResponse::data(appointment))
}

/// `PATCH /api/appointments/:id/status`
pub async fn update_status(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<ApiResponse<Appointment>>, ApiError> {
    authorization::require(caller.user.role(), Capability::ManageAppointmentStatus)?;

    let conn = ctx.state.open_db()?;
    let current =
        db::get_appointment(&conn, &id)?.ok_or(ApiError::NotFound("Appointment not found".into()))?;
    // A doctor manages only their own schedule
    if caller.user.role() == UserRole::Doctor && current.doctor_id != caller.user.id {
        return Err(ApiError::forbidden());
    }

    let updated = scheduling::change_status(&conn, &id, request.status)?;
    ctx.state.notifier.notify_appointment(&updated);
    Ok(ApiResponse::data(updated))
}

/// `GET /api/appointments/availability?doctor_id=&date=`
pub async fn availability(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<ApiResponse<Vec<AvailabilitySlot>>>, ApiError> {
    authorization::require(caller.user.role(), Capability::ViewDoctorDirectory)?;
    let conn = ctx.state.open_db()?;
    let slots = scheduling::availability(&conn, &query.doctor_id, query.date)?;
    Ok(ApiResponse::data(slots))
}
