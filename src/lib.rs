//! Gatekeeper - a small web server that gates an account page behind
//! GitHub sign-in
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Session layer (middleware)                  │
//! │  - Signed cookie -> session ID -> SessionStore record        │
//! │  - Persists changes and rotates IDs after each handler       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Routes (Axum)                           │
//! │  - Public: /, /login, /logout, /auth/github[/callback]       │
//! │  - Guarded by the auth gate: /account, /metrics              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Identity provider                          │
//! │  - GitHub OAuth code exchange and profile fetch              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: Page handlers, views and the metrics endpoint
//! - `auth`: OAuth flow, session lifecycle, auth gate
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;

use std::sync::Arc;

use axum::{extract::Request, middleware::Next, response::Response};

/// Application state shared across all handlers
///
/// This struct is cloned for each request; every field is shared.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Server-side session records
    pub sessions: Arc<dyn auth::SessionStore>,

    /// Profile encoding used for session records
    pub codec: Arc<dyn auth::SessionCodec>,

    /// OAuth identity provider
    pub provider: Arc<dyn auth::IdentityProvider>,
}

impl AppState {
    /// Initialize application state with the GitHub provider
    ///
    /// # Errors
    /// Returns error if the provider's HTTP client cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        let provider = auth::GitHubProvider::new(&config.auth.github, &config.server)?;
        tracing::info!(
            callback_url = %config.server.callback_url(),
            scope = ?config.auth.github.scope,
            "GitHub OAuth provider configured"
        );
        Ok(Self::with_provider(config, Arc::new(provider)))
    }

    /// Initialize application state around a given identity provider
    ///
    /// Sessions live in memory and profiles are stored as JSON.
    pub fn with_provider(
        config: config::AppConfig,
        provider: Arc<dyn auth::IdentityProvider>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            sessions: Arc::new(auth::MemorySessionStore::new()),
            codec: Arc::new(auth::JsonSessionCodec),
            provider,
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware};
    use tower_http::{services::ServeDir, trace::TraceLayer};

    let static_files = ServeDir::new(&state.config.server.static_dir);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::pages_router())
        .merge(auth::auth_router())
        .merge(api::metrics_router())
        .fallback_service(static_files)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::session_layer,
        ))
        .layer(middleware::from_fn(track_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Count every response by method and status
async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let response = next.run(request).await;

    use crate::metrics::HTTP_REQUESTS_TOTAL;
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), response.status().as_str()])
        .inc();

    response
}

async fn health_check() -> &'static str {
    "OK"
}
