//! Authentication gate
//!
//! Protects routes that require a signed-in user. Unauthenticated
//! requests are redirected to the login page rather than rejected.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::provider::UserProfile;
use super::session::Session;
use crate::error::AppError;

/// Where unauthenticated requests are sent
pub const LOGIN_PATH: &str = "/login";

/// Outcome of the gate for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    RedirectToLogin,
}

impl GateDecision {
    fn label(self) -> &'static str {
        match self {
            GateDecision::Allow => "allow",
            GateDecision::RedirectToLogin => "redirect",
        }
    }
}

/// Decide whether a request may reach a guarded handler
pub fn gate(authenticated: bool) -> GateDecision {
    if authenticated {
        GateDecision::Allow
    } else {
        GateDecision::RedirectToLogin
    }
}

/// `302 Found` to `location`
pub fn redirect_found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Middleware to require authentication
///
/// Reads the request's session (installed by the session layer) and
/// either runs the inner handler or redirects to `/login`. Never touches
/// session state.
///
/// # Usage
/// ```ignore
/// let guarded = Router::new()
///     .route("/account", get(account))
///     .route_layer(middleware::from_fn(require_auth));
/// ```
pub async fn require_auth(session: Session, request: Request, next: Next) -> Response {
    let decision = gate(session.is_authenticated().await);

    use crate::metrics::AUTH_GATE_DECISIONS_TOTAL;
    AUTH_GATE_DECISIONS_TOTAL
        .with_label_values(&[decision.label()])
        .inc();

    match decision {
        GateDecision::Allow => next.run(request).await,
        GateDecision::RedirectToLogin => {
            tracing::debug!(path = %request.uri().path(), "Unauthenticated request redirected to login");
            redirect_found(LOGIN_PATH)
        }
    }
}

/// Extractor for current authenticated user
///
/// Use in handlers to get the session's profile. Rejects with the same
/// redirect as [`require_auth`].
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(user): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", user.label())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserProfile);

/// Rejection for [`CurrentUser`]
pub enum CurrentUserRejection {
    Unauthenticated,
    Session(AppError),
}

impl IntoResponse for CurrentUserRejection {
    fn into_response(self) -> Response {
        match self {
            CurrentUserRejection::Unauthenticated => redirect_found(LOGIN_PATH),
            CurrentUserRejection::Session(error) => error.into_response(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = CurrentUserRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(CurrentUserRejection::Session)?;

        session
            .user()
            .await
            .map(CurrentUser)
            .ok_or(CurrentUserRejection::Unauthenticated)
    }
}

/// Optional current user extractor
///
/// Returns None if not authenticated, instead of redirecting.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<UserProfile>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => session.user().await,
            None => None,
        };
        Ok(MaybeUser(user))
    }
}
