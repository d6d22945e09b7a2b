//! Unauthenticated liveness probe.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiResponse};
use crate::config;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /api/health`
pub async fn check(
    State(ctx): State<ApiContext>,
) -> Result<Json<ApiResponse<HealthStatus>>, ApiError> {
    // Opening a connection doubles as a storage check
    let _conn = ctx.state.open_db()?;
    Ok(ApiResponse::data(HealthStatus {
        status: "ok",
        version: config::APP_VERSION,
    }))
}
