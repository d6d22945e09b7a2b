//! Payment endpoints: record, role-scoped listing, and the
//! pending → completed → refunded lifecycle that feeds revenue reports.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiResponse, AuthContext};
use crate::authorization::{self, Capability};
use crate::db;
use crate::models::*;

#[derive(Deserialize)]
pub struct CreatePaymentRequest {
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub amount: f64,
    pub method: PaymentMethod,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: PaymentStatus,
}

/// Forward-only lifecycle.
fn can_transition(from: PaymentStatus, to: PaymentStatus) -> bool {
    matches!(
        (from, to),
        (PaymentStatus::Pending, PaymentStatus::Completed)
            | (PaymentStatus::Completed, PaymentStatus::Refunded)
    )
}

/// `POST /api/payments`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<ApiResponse<Payment>>, ApiError> {
    authorization::require(caller.user.role(), Capability::RecordPayment)?;
    if !request.amount.is_finite() || request.amount <= 0.0 {
        return Err(ApiError::BadRequest("Amount must be positive".into()));
    }

    let conn = ctx.state.open_db()?;
    db::get_user(&conn, &request.patient_id)?
        .filter(|u| u.role() == UserRole::Patient)
        .ok_or(ApiError::BadRequest("Unknown patient".into()))?;
    if let Some(appointment_id) = &request.appointment_id {
        db::get_appointment(&conn, appointment_id)?
            .ok_or(ApiError::BadRequest("Unknown appointment".into()))?;
    }

    let now = chrono::Utc::now().naive_utc();
    let payment = Payment {
        id: Uuid::new_v4(),
        patient_id: request.patient_id,
        appointment_id: request.appointment_id,
        amount: request.amount,
        method: request.method,
        status: PaymentStatus::Pending,
        description: request.description,
        created_at: now,
        updated_at: now,
    };
    db::insert_payment(&conn, &payment)?;
    Ok(ApiResponse::message(payment, "Payment recorded."))
}

/// `GET /api/payments` — patients see their own; staff and above see all.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Query(mut filter): Query<PaymentFilter>,
) -> Result<Json<ApiResponse<Vec<Payment>>>, ApiError> {
    let role = caller.user.role();
    if authorization::allowed(role, Capability::ViewAllPayments) {
        // Filter passes through unchanged
    } else if authorization::allowed(role, Capability::ViewOwnPayments) {
        filter.patient_id = Some(caller.user.id);
    } else {
        return Err(ApiError::forbidden());
    }
    let conn = ctx.state.open_db()?;
    Ok(ApiResponse::data(db::list_payments(&conn, &filter)?))
}

/// `PATCH /api/payments/:id/status`
pub async fn update_status(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<ApiResponse<Payment>>, ApiError> {
    authorization::require(caller.user.role(), Capability::RecordPayment)?;

    let conn = ctx.state.open_db()?;
    let payment =
        db::get_payment(&conn, &id)?.ok_or(ApiError::NotFound("Payment not found".into()))?;
    if !can_transition(payment.status, request.status) {
        return Err(ApiError::BadRequest(format!(
            "Cannot move payment from {} to {}",
            payment.status.as_str(),
            request.status.as_str()
        )));
    }
    db::update_payment_status(&conn, &id, request.status)?;
    let updated =
        db::get_payment(&conn, &id)?.ok_or(ApiError::NotFound("Payment not found".into()))?;
    Ok(ApiResponse::data(updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_lifecycle_is_forward_only() {
        use PaymentStatus::*;
        assert!(can_transition(Pending, Completed));
        assert!(can_transition(Completed, Refunded));
        assert!(!can_transition(Pending, Refunded));
        assert!(!can_transition(Refunded, Pending));
        assert!(!can_transition(Completed, Pending));
        assert!(!can_transition(Completed, Completed));
    }
}
