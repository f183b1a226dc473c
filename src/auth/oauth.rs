//! GitHub OAuth flow
//!
//! Implements the OAuth 2.0 authorization code flow on top of the
//! session lifecycle. The provider client does the protocol work.

use axum::{
    Router,
    extract::{Query, State, rejection::QueryRejection},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use super::middleware::{LOGIN_PATH, MaybeUser, redirect_found};
use super::provider::UserProfile;
use super::session::{Session, generate_token};
use crate::AppState;
use crate::api::views;
use crate::error::AppError;

/// Create authentication router
///
/// Routes:
/// - GET /login - Login page
/// - GET /logout - Logout
/// - GET /auth/github - Redirect to GitHub
/// - GET /auth/github/callback - OAuth callback
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page))
        .route("/logout", get(logout))
        .route("/auth/github", get(github_redirect))
        .route("/auth/github/callback", get(github_callback))
}

// =============================================================================
// Login Page
// =============================================================================

/// GET /login
///
/// Renders a simple login page with GitHub sign-in button.
async fn login_page(MaybeUser(user): MaybeUser) -> impl IntoResponse {
    Html(views::login(user.as_ref()))
}

// =============================================================================
// GitHub OAuth
// =============================================================================

/// GET /auth/github
///
/// Redirects user to GitHub authorization page.
///
/// # Steps
/// 1. Generate CSRF state token
/// 2. Store state in the session (Anonymous -> Authenticating)
/// 3. Redirect to GitHub with client_id, redirect_uri, scope, state
async fn github_redirect(State(state): State<AppState>, session: Session) -> Response {
    if session.is_authenticated().await {
        return redirect_found("/");
    }

    let csrf_state = generate_csrf_state();
    session.begin_authentication(csrf_state.clone()).await;

    tracing::debug!(provider = state.provider.name(), "Starting OAuth handshake");
    redirect_found(&state.provider.authorize_url(&csrf_state))
}

/// Query parameters from GitHub callback
///
/// GitHub sends `error` instead of `code` when the user denies access.
#[derive(Debug, Default, Deserialize)]
struct GitHubCallbackQuery {
    /// Authorization code
    code: Option<String>,
    /// CSRF state token
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /auth/github/callback
///
/// Handles OAuth callback from GitHub.
///
/// # Steps
/// 1. Take the pending CSRF state (session leaves Authenticating)
/// 2. Verify it against the returned state
/// 3. Exchange code for the user's profile
/// 4. Attach profile to the session and redirect home
///
/// Any failure leaves the session Anonymous and redirects to `/login`,
/// including a query string that does not parse.
async fn github_callback(
    State(state): State<AppState>,
    session: Session,
    query: Result<Query<GitHubCallbackQuery>, QueryRejection>,
) -> Response {
    use crate::metrics::OAUTH_CALLBACKS_TOTAL;

    match complete_login(&state, &session, query).await {
        Ok(user) => {
            tracing::info!(
                provider = state.provider.name(),
                user_id = %user.id,
                username = ?user.username,
                "User signed in"
            );
            session.login(user).await;
            OAUTH_CALLBACKS_TOTAL.with_label_values(&["success"]).inc();
            redirect_found("/")
        }
        Err(error) => {
            tracing::warn!(%error, provider = state.provider.name(), "OAuth callback failed");
            OAUTH_CALLBACKS_TOTAL.with_label_values(&["failure"]).inc();
            redirect_found(LOGIN_PATH)
        }
    }
}

async fn complete_login(
    state: &AppState,
    session: &Session,
    query: Result<Query<GitHubCallbackQuery>, QueryRejection>,
) -> Result<UserProfile, AppError> {
    let expected_state = session.take_pending_state().await;

    let Query(query) = query.map_err(|rejection| {
        AppError::IdentityProvider(format!("malformed callback query: {rejection}"))
    })?;

    if let Some(error) = query.error {
        return Err(AppError::IdentityProvider(format!(
            "authorization denied: {}",
            query.error_description.unwrap_or(error)
        )));
    }

    verify_csrf_state(expected_state.as_deref(), query.state.as_deref())?;

    let code = query
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::IdentityProvider("callback is missing the code".to_string()))?;

    state.provider.exchange(&code).await
}

// =============================================================================
// Logout
// =============================================================================

/// GET /logout
///
/// Destroys the session, clears the cookie and redirects home.
async fn logout(session: Session) -> Response {
    if let Some(user) = session.user().await {
        tracing::info!(user_id = %user.id, "User signed out");
        crate::metrics::LOGOUTS_TOTAL.inc();
    }
    session.logout().await;
    redirect_found("/")
}

// =============================================================================
// Helpers
// =============================================================================

/// Generate a random CSRF state token
fn generate_csrf_state() -> String {
    generate_token(24)
}

/// Verify the callback's state matches the one stored at redirect time
fn verify_csrf_state(expected: Option<&str>, returned: Option<&str>) -> Result<(), AppError> {
    match (expected, returned) {
        (Some(expected), Some(returned)) if !expected.is_empty() && expected == returned => Ok(()),
        (None, _) => Err(AppError::IdentityProvider(
            "no OAuth handshake in progress".to_string(),
        )),
        _ => Err(AppError::IdentityProvider(
            "OAuth state mismatch".to_string(),
        )),
    }
}
