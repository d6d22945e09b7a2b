//! Chatbot endpoints: the keyword dispatcher plus the static reference
//! surfaces (health tips, symptom lookup, emergency check).

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiResponse, AuthContext};
use crate::authorization::{self, Capability};
use crate::chatbot::{self, BotReply, SymptomEntry};

#[derive(Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

/// `POST /api/chatbot/message`
pub async fn message(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<ApiResponse<BotReply>>, ApiError> {
    authorization::require(caller.user.role(), Capability::UseChatbot)?;
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".into()));
    }
    let conn = ctx.state.open_db()?;
    let reply = chatbot::respond_for_user(&conn, &caller.user.id, &request.message)?;
    Ok(ApiResponse::data(reply))
}

/// `GET /api/chatbot/history` — conversations are not stored server-side;
/// the endpoint stays to preserve the API surface.
pub async fn history(
    Extension(caller): Extension<AuthContext>,
) -> Result<Json<ApiResponse<Vec<BotReply>>>, ApiError> {
    authorization::require(caller.user.role(), Capability::UseChatbot)?;
    Ok(ApiResponse::message(
        Vec::new(),
        "Conversation history is not stored.",
    ))
}

/// `GET /api/chatbot/health-tips`
pub async fn health_tips(
    Extension(caller): Extension<AuthContext>,
) -> Result<Json<ApiResponse<Vec<&'static str>>>, ApiError> {
    authorization::require(caller.user.role(), Capability::UseChatbot)?;
    Ok(ApiResponse::data(chatbot::HEALTH_TIPS.to_vec()))
}

/// `GET /api/chatbot/symptoms/:name`
pub async fn symptom(
    Extension(caller): Extension<AuthContext>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<&'static SymptomEntry>>, ApiError> {
    authorization::require(caller.user.role(), Capability::UseChatbot)?;
    let entry = chatbot::symptom_by_name(&name)
        .ok_or_else(|| ApiError::NotFound(format!("No guidance on file for \"{name}\"")))?;
    Ok(ApiResponse::data(entry))
}

#[derive(Serialize)]
pub struct EmergencyCheck {
    pub emergency: bool,
}

/// `POST /api/chatbot/emergency-check`
pub async fn emergency_check(
    Extension(caller): Extension<AuthContext>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<ApiResponse<EmergencyCheck>>, ApiError> {
    authorization::require(caller.user.role(), Capability::UseChatbot)?;
    Ok(ApiResponse::data(EmergencyCheck {
        emergency: chatbot::is_emergency(&request.message),
    }))
}
