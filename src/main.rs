use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use urbancare::core_state::AppState;
use urbancare::mailer::LogMailer;
use urbancare::{api, bootstrap, config, db};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("UrbanCare starting v{}", config::APP_VERSION);

    let db_path = config::database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Migrations and the admin upsert run before the first request
    {
        let conn = db::open_database(&db_path)?;
        bootstrap::ensure_admin(&conn)?;
        let pruned = db::prune_expired_sessions(&conn, chrono::Utc::now().naive_utc())?;
        if pruned > 0 {
            tracing::info!(pruned, "expired sessions removed");
        }
    }

    let state = Arc::new(AppState::new(db_path, Arc::new(LogMailer)));
    let mut server = api::server::start_server(state, config::bind_addr()).await?;
    tracing::info!(addr = %server.addr, "listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    server.shutdown();
    Ok(())
}
