//! Reporting endpoints. Every report recomputes from the stored rows on
//! each call; there is no cached aggregate to invalidate.

use axum::extract::{Query, State};
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiResponse, AuthContext};
use crate::authorization::{self, Capability};
use crate::models::ReportWindow;
use crate::reports::{self, AppointmentReport, DashboardStats, RevenueReport, UserReport};

/// `GET /api/reports/dashboard` — role-aware counts for any caller.
pub async fn dashboard(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
) -> Result<Json<ApiResponse<DashboardStats>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let today = chrono::Utc::now().date_naive();
    let stats = reports::dashboard_stats(&conn, &caller.actor(), today)?;
    Ok(ApiResponse::data(stats))
}

/// `GET /api/reports/appointments?from=&to=`
pub async fn appointments(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Query(window): Query<ReportWindow>,
) -> Result<Json<ApiResponse<AppointmentReport>>, ApiError> {
    authorization::require(caller.user.role(), Capability::ViewReports)?;
    let conn = ctx.state.open_db()?;
    Ok(ApiResponse::data(reports::appointment_report(&conn, window)?))
}

/// `GET /api/reports/revenue?from=&to=`
pub async fn revenue(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Query(window): Query<ReportWindow>,
) -> Result<Json<ApiResponse<RevenueReport>>, ApiError> {
    authorization::require(caller.user.role(), Capability::ViewReports)?;
    let conn = ctx.state.open_db()?;
    Ok(ApiResponse::data(reports::revenue_report(&conn, window)?))
}

/// `GET /api/reports/users` — admin only.
pub async fn users(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
) -> Result<Json<ApiResponse<UserReport>>, ApiError> {
    authorization::require(caller.user.role(), Capability::ViewUserReport)?;
    let conn = ctx.state.open_db()?;
    Ok(ApiResponse::data(reports::user_report(&conn)?))
}

/// `GET /api/reports/export` — kept as an explicit stub to preserve the
/// API surface.
pub async fn export(
    Extension(caller): Extension<AuthContext>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    authorization::require(caller.user.role(), Capability::ViewReports)?;
    Ok(ApiResponse::message(
        (),
        "Report export is not available yet.",
    ))
}
