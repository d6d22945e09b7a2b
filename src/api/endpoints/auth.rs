//! Authentication endpoints: registration, sessions, one-time token
//! flows, and WebSocket upgrade tickets.

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiResponse, AuthContext};
use crate::auth::{self, RegisterRequest, TokenPair};
use crate::models::UserPublic;
use crate::notifications::WS_TICKET_TTL;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: UserPublic,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// `POST /api/auth/register`
pub async fn register(
    State(ctx): State<ApiContext>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<UserPublic>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let user = auth::register(&conn, request, ctx.state.mailer.as_ref())?;
    Ok(ApiResponse::message(
        user.public(),
        "Account created. Check your inbox for a verification code.",
    ))
}

/// `POST /api/auth/login`
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let (user, tokens) = auth::login(&conn, &request.email, &request.password)?;
    Ok(ApiResponse::data(LoginResponse {
        user: user.public(),
        tokens,
    }))
}

/// `POST /api/auth/refresh`
pub async fn refresh(
    State(ctx): State<ApiContext>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<TokenPair>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let tokens = auth::refresh(&conn, &request.refresh_token)?;
    Ok(ApiResponse::data(tokens))
}

/// `POST /api/auth/verify-email`
pub async fn verify_email(
    State(ctx): State<ApiContext>,
    Json(request): Json<VerifyEmailRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let conn = ctx.state.open_db()?;
    auth::verify_email(&conn, &request.token)?;
    Ok(ApiResponse::message((), "Email address verified."))
}

/// `POST /api/auth/forgot-password` — the response never reveals whether
/// the address is registered.
pub async fn forgot_password(
    State(ctx): State<ApiContext>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let conn = ctx.state.open_db()?;
    auth::start_password_reset(&conn, &request.email, ctx.state.mailer.as_ref())?;
    Ok(ApiResponse::message(
        (),
        "If that address is registered, a reset code is on its way.",
    ))
}

/// `POST /api/auth/reset-password`
pub async fn reset_password(
    State(ctx): State<ApiContext>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let conn = ctx.state.open_db()?;
    auth::reset_password(&conn, &request.token, &request.password)?;
    Ok(ApiResponse::message((), "Password updated. Log in with the new password."))
}

/// `POST /api/auth/logout`
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let conn = ctx.state.open_db()?;
    auth::logout(&conn, &caller.token)?;
    Ok(ApiResponse::message((), "Logged out."))
}

/// `GET /api/auth/me`
pub async fn me(
    Extension(caller): Extension<AuthContext>,
) -> Result<Json<ApiResponse<UserPublic>>, ApiError> {
    Ok(ApiResponse::data(caller.user.public()))
}

#[derive(Serialize)]
pub struct WsTicketResponse {
    pub ticket: String,
    pub expires_in: u64,
}

/// `POST /api/auth/ws-ticket` — one-time WebSocket upgrade ticket, so the
/// bearer token never appears in a URL.
pub async fn ws_ticket(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
) -> Result<Json<ApiResponse<WsTicketResponse>>, ApiError> {
    let ticket = {
        let mut tickets = ctx
            .ws_tickets
            .lock()
            .map_err(|_| ApiError::Internal("ticket lock".into()))?;
        tickets.issue(caller.user.id)
    };
    Ok(ApiResponse::data(WsTicketResponse {
        ticket,
        expires_in: WS_TICKET_TTL.as_secs(),
    }))
}
