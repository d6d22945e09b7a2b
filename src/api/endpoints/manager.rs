//! Manager reporting endpoints, restricted to manager/admin.

use axum::extract::{Query, State};
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiResponse, AuthContext};
use crate::authorization::{self, Capability};
use crate::models::ReportWindow;
use crate::reports::{
    self, FinancialReport, ManagerOverview, PatientVisitReport, StaffUtilization,
};

/// `GET /api/manager/overview`
pub async fn overview(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
) -> Result<Json<ApiResponse<ManagerOverview>>, ApiError> {
    authorization::require(caller.user.role(), Capability::ViewManagerReports)?;
    let conn = ctx.state.open_db()?;
    let today = chrono::Utc::now().date_naive();
    Ok(ApiResponse::data(reports::manager_overview(&conn, today)?))
}

/// `GET /api/manager/patient-visits?from=&to=`
pub async fn patient_visits(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Query(window): Query<ReportWindow>,
) -> Result<Json<ApiResponse<PatientVisitReport>>, ApiError> {
    authorization::require(caller.user.role(), Capability::ViewManagerReports)?;
    let conn = ctx.state.open_db()?;
    Ok(ApiResponse::data(reports::patient_visit_report(&conn, window)?))
}

/// `GET /api/manager/staff-utilization?from=&to=`
pub async fn staff_utilization(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Query(window): Query<ReportWindow>,
) -> Result<Json<ApiResponse<Vec<StaffUtilization>>>, ApiError> {
    authorization::require(caller.user.role(), Capability::ViewManagerReports)?;
    let conn = ctx.state.open_db()?;
    Ok(ApiResponse::data(reports::staff_utilization_report(&conn, window)?))
}

/// `GET /api/manager/financial?from=&to=`
pub async fn financial(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Query(window): Query<ReportWindow>,
) -> Result<Json<ApiResponse<FinancialReport>>, ApiError> {
    authorization::require(caller.user.role(), Capability::ViewManagerReports)?;
    let conn = ctx.state.open_db()?;
    Ok(ApiResponse::data(reports::financial_report(&conn, window)?))
}
