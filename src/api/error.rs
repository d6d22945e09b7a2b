//! API error taxonomy with structured JSON responses.
//!
//! Every failure maps to the shared error envelope
//! `{"success": false, "error": <message>, "errors": [<field errors>]?}`.
//! Internal detail is logged server-side and never reaches the body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::{AuthError, FieldError};
use crate::authorization::Denied;
use crate::db::DatabaseError;
use crate::records::RecordError;
use crate::reports::ReportError;
use crate::scheduling::ScheduleError;

/// Error envelope body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Standard denial for role/ownership failures.
    pub fn forbidden() -> Self {
        ApiError::Forbidden("You do not have permission to perform this action".into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) | ApiError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error, errors) = match self {
            ApiError::Validation(field_errors) => ("Validation failed".to_string(), Some(field_errors)),
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "API internal error");
                ("An internal error occurred".to_string(), None)
            }
            other => (other.to_string(), None),
        };
        let body = ErrorBody {
            success: false,
            error,
            errors,
        };
        (status, Json(body)).into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                ApiError::Unauthenticated("Invalid email or password".into())
            }
            AuthError::AccountDisabled => ApiError::Forbidden("Account is disabled".into()),
            AuthError::TokenInvalid => ApiError::Unauthenticated("Token invalid or expired".into()),
            AuthError::Validation(errors) => ApiError::Validation(errors),
            AuthError::Database(e) => e.into(),
        }
    }
}

impl From<ScheduleError> for ApiError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::SlotUnavailable => {
                ApiError::Conflict("The requested slot is unavailable".into())
            }
            ScheduleError::NotFound => ApiError::NotFound("Appointment not found".into()),
            ScheduleError::UnknownDoctor => ApiError::BadRequest("Unknown doctor".into()),
            ScheduleError::UnknownPatient => ApiError::BadRequest("Unknown patient".into()),
            ScheduleError::Validation(message) => ApiError::BadRequest(message),
            ScheduleError::InvalidTransition { .. } => ApiError::BadRequest(err.to_string()),
            ScheduleError::Database(e) => e.into(),
        }
    }
}

impl From<RecordError> for ApiError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotFound => ApiError::NotFound("Medical record not found".into()),
            RecordError::Forbidden => ApiError::forbidden(),
            RecordError::Validation(message) => ApiError::BadRequest(message),
            RecordError::Database(e) => e.into(),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::Validation(message) => ApiError::BadRequest(message),
            ReportError::Database(e) => e.into(),
        }
    }
}

impl From<Denied> for ApiError {
    fn from(_: Denied) -> Self {
        ApiError::forbidden()
    }
}
