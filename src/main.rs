//! Gatekeeper binary entry point

use gatekeeper::auth::SessionStore;
use gatekeeper::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load `.env` and configuration
/// 2. Initialize tracing/logging
/// 3. Initialize AppState
/// 4. Build Axum router
/// 5. Start background tasks (session sweeper)
/// 6. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    if let Err(error) = dotenvy::dotenv() {
        if !error.not_found() {
            return Err(error.into());
        }
    }
    let loaded = config::AppConfig::load();

    // 2. Initialize tracing/logging
    let (level, format) = match &loaded {
        Ok(config) => (config.logging.level.clone(), config.logging.format.clone()),
        Err(_) => ("info".to_string(), "pretty".to_string()),
    };
    init_tracing(&level, &format);

    let config = loaded.inspect_err(|error| {
        tracing::error!(%error, "Failed to load configuration");
    })?;
    tracing::info!(
        base_url = %config.server.base_url(),
        static_dir = %config.server.static_dir.display(),
        "Configuration loaded"
    );
    if !config.should_use_secure_cookies() {
        tracing::warn!("Using insecure session cookies; set PUBLIC_URL to an https URL in production");
    }

    gatekeeper::metrics::init_metrics();

    // 3. Initialize application state
    let state = AppState::new(config.clone())?;

    // 4. Build Axum router
    let app = gatekeeper::build_router(state.clone());

    // 5. Start background tasks
    spawn_session_sweeper(state);

    // 6. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("gatekeeper={level},tower_http=debug").into());

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Spawn background task that drops expired sessions
fn spawn_session_sweeper(state: AppState) {
    let interval_secs = state.config.auth.sweep_interval_seconds.max(1);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        // The first tick fires immediately; nothing can have expired yet
        interval.tick().await;

        loop {
            interval.tick().await;

            match state.sessions.prune_expired().await {
                Ok(removed) => tracing::debug!(removed, "Session sweep completed"),
                Err(error) => tracing::error!(%error, "Session sweep failed"),
            }
        }
    });

    tracing::info!(interval_secs, "Session sweeper spawned");
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
