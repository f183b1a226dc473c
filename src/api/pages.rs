//! Page routes
//!
//! - GET / - Home (public)
//! - GET /account - Account details (requires a signed-in user)

use axum::{Router, middleware, response::Html, routing::get};

use super::views;
use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser, require_auth};

/// Create page router
pub fn pages_router() -> Router<AppState> {
    let guarded = Router::new()
        .route("/account", get(account))
        .route_layer(middleware::from_fn(require_auth));

    Router::new().route("/", get(home)).merge(guarded)
}

/// GET /
async fn home(MaybeUser(user): MaybeUser) -> Html<String> {
    Html(views::index(user.as_ref()))
}

/// GET /account
///
/// Only reachable through the auth gate, so the user is always present.
async fn account(CurrentUser(user): CurrentUser) -> Html<String> {
    Html(views::account(&user))
}
