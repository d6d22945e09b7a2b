//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves it against the
//! session store, and injects [`AuthContext`] into request extensions for
//! downstream handlers. Client network metadata is captured here so the
//! services can carry it into audit rows.

use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::auth;
use crate::models::ClientMeta;

/// Require a valid bearer token for an active account.
pub async fn require_auth(req: Request<Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthenticated("Authentication required".into()))?
        .to_string();

    let client = client_meta(&req);

    // Connection is scoped so it is not held across the handler await
    let auth_ctx = {
        let conn = ctx.state.open_db()?;
        let user = auth::authenticate(&conn, &token)?;
        AuthContext {
            user,
            token,
            client,
        }
    };

    req.extensions_mut().insert(auth_ctx);
    Ok(next.run(req).await)
}

/// Client metadata from the request. The service sits behind a reverse
/// proxy, so the original address arrives in `X-Forwarded-For`.
fn client_meta(req: &Request<Body>) -> ClientMeta {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    ClientMeta {
        ip_address: header("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|s| s.trim().to_string())),
        user_agent: header("user-agent"),
    }
}
