//! HTTP server lifecycle: bind → spawn background task → return a handle
//! with a shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::api::router::api_router;
use crate::core_state::AppState;

/// Handle to a running API server.
pub struct ApiServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ApiServer {
    /// Shut down the server gracefully. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }
}

/// Bind the given address and serve the API in a background task.
pub async fn start_server(state: Arc<AppState>, addr: SocketAddr) -> Result<ApiServer, String> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind {addr}: {e}"))?;
    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to read server address: {e}"))?;

    let app = api_router(state);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("API server error: {e}");
        }
        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::LogMailer;

    fn test_state(dir: &tempfile::TempDir) -> Arc<AppState> {
        Arc::new(AppState::new(
            dir.path().join("server-test.db"),
            Arc::new(LogMailer),
        ))
    }

    #[tokio::test]
    async fn start_serve_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = start_server(test_state(&dir), "127.0.0.1:0".parse().unwrap())
            .await
            .expect("server should start");
        assert!(server.addr.port() > 0);

        let url = format!("http://{}/api/health", server.addr);
        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let json: serde_json::Value = response.json().await.unwrap();
        assert_eq!(json["data"]["status"], "ok");

        // Protected route without a token is rejected
        let url = format!("http://{}/api/appointments", server.addr);
        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

        server.shutdown();
        server.shutdown(); // second call is a no-op
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = start_server(test_state(&dir), "127.0.0.1:0".parse().unwrap())
            .await
            .expect("server should start");

        let url = format!("http://{}/nonexistent", server.addr);
        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

        server.shutdown();
    }
}
