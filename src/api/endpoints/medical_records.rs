//! Medical record endpoints. Authorization and audit both live in the
//! record service; handlers only shape the transport.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiResponse, AuthContext};
use crate::models::*;
use crate::records::{self, CreateRecordRequest, PatientSummary};

#[derive(Deserialize)]
pub struct RecordListQuery {
    pub patient_id: Option<Uuid>,
    pub record_type: Option<RecordType>,
}

/// `GET /api/medical-records`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Query(query): Query<RecordListQuery>,
) -> Result<Json<ApiResponse<Vec<MedicalRecord>>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let filter = RecordFilter {
        patient_id: query.patient_id,
        record_type: query.record_type,
    };
    let found = records::list_records(&conn, &caller.actor(), &caller.client, filter)?;
    Ok(ApiResponse::data(found))
}

/// `POST /api/medical-records`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Json(request): Json<CreateRecordRequest>,
) -> Result<Json<ApiResponse<MedicalRecord>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let record = records::create_record(&conn, &caller.actor(), &caller.client, request)?;
    Ok(ApiResponse::message(record, "Medical record created."))
}

/// `GET /api/medical-records/:id`
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<MedicalRecord>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let record = records::read_record(&conn, &caller.actor(), &caller.client, &id)?;
    Ok(ApiResponse::data(record))
}

/// `PUT /api/medical-records/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(changes): Json<RecordUpdate>,
) -> Result<Json<ApiResponse<MedicalRecord>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let record = records::update_record(&conn, &caller.actor(), &caller.client, &id, changes)?;
    Ok(ApiResponse::data(record))
}

/// `DELETE /api/medical-records/:id` — soft delete, admin only.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let conn = ctx.state.open_db()?;
    records::delete_record(&conn, &caller.actor(), &caller.client, &id)?;
    Ok(ApiResponse::message((), "Medical record deleted."))
}

/// `GET /api/medical-records/patient/:id/summary`
pub async fn patient_summary(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PatientSummary>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let summary = records::patient_summary(&conn, &caller.actor(), &caller.client, &id)?;
    Ok(ApiResponse::data(summary))
}
