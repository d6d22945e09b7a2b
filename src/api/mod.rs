//! HTTP/JSON API layer.
//!
//! Routes are nested under `/api/` and protected by bearer-token
//! authentication; `api_router()` returns a composable `Router` that can
//! be mounted on any axum server. A ticket-gated WebSocket channel under
//! `/ws/connect` pushes appointment updates to connected clients.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;
pub mod websocket;

pub use error::ApiError;
pub use router::api_router;
pub use server::ApiServer;
pub use types::{ApiContext, ApiResponse, AuthContext};
