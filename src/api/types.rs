//! Shared types for the API layer: router context, the authenticated
//! caller, and the success envelope.

use std::sync::{Arc, Mutex};

use axum::Json;
use serde::Serialize;

use crate::authorization::Actor;
use crate::core_state::AppState;
use crate::models::{ClientMeta, User};
use crate::notifications::WsTicketStore;

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub state: Arc<AppState>,
    pub ws_tickets: Arc<Mutex<WsTicketStore>>,
}

impl ApiContext {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            ws_tickets: Arc::new(Mutex::new(WsTicketStore::new())),
        }
    }
}

/// Authenticated caller, injected into request extensions by the auth
/// middleware after the bearer token resolves to an active account.
#[derive(Clone)]
pub struct AuthContext {
    pub user: User,
    pub token: String,
    pub client: ClientMeta,
}

impl AuthContext {
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.user.id,
            role: self.user.role(),
        }
    }
}

/// Success envelope: `{"success": true, "data": ..., "message": ...?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn data(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            message: None,
        })
    }

    pub fn message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            message: Some(message.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_shape() {
        let Json(envelope) = ApiResponse::data(vec![1, 2, 3]);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], serde_json::json!([1, 2, 3]));
        assert!(json.get("message").is_none());

        let Json(envelope) = ApiResponse::message((), "done");
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["message"], "done");
        assert!(json["data"].is_null());
    }
}
