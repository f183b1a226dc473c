//! Session management
//!
//! The browser holds a signed cookie naming a random session ID; the
//! profile itself stays server-side in the [`SessionStore`](super::store::SessionStore).
//!
//! Cookie format: `{session_id}.{base64(hmac_sha256(session_id))}`
//!
//! [`session_layer`] loads the session before routing and persists it
//! after the handler runs. Handlers only ever see the [`Session`] handle.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{Engine as _, engine::general_purpose};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::Mutex;

use super::provider::UserProfile;
use super::store::SessionRecord;
use crate::AppState;
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Where a session stands in the sign-in flow
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No profile attached
    #[default]
    Anonymous,
    /// Sent to the provider, waiting for the callback
    Authenticating { csrf_state: String },
    /// Provider callback succeeded
    Authenticated { user: UserProfile },
}

#[derive(Debug)]
struct SessionInner {
    /// ID loaded from the cookie, if the cookie named a live session
    id: Option<String>,
    state: SessionState,
    /// Issue a fresh ID when persisting
    regenerate: bool,
    /// Remove the stored session and the cookie
    destroyed: bool,
    /// A handler changed the state; only then is the record rewritten
    modified: bool,
}

/// Per-request session handle
///
/// Cloning shares the same underlying session.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    fn new(id: Option<String>, state: SessionState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                id,
                state,
                regenerate: false,
                destroyed: false,
                modified: false,
            })),
        }
    }

    /// Fresh anonymous session with no stored counterpart
    pub fn anonymous() -> Self {
        Self::new(None, SessionState::Anonymous)
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state.clone()
    }

    /// The attached profile, if authenticated
    pub async fn user(&self) -> Option<UserProfile> {
        match &self.inner.lock().await.state {
            SessionState::Authenticated { user } => Some(user.clone()),
            _ => None,
        }
    }

    /// A session is authenticated iff it carries a profile
    pub async fn is_authenticated(&self) -> bool {
        matches!(
            self.inner.lock().await.state,
            SessionState::Authenticated { .. }
        )
    }

    /// Anonymous -> Authenticating
    ///
    /// Also restarts the handshake when a previous one was abandoned.
    pub async fn begin_authentication(&self, csrf_state: String) {
        let mut inner = self.inner.lock().await;
        inner.state = SessionState::Authenticating { csrf_state };
        inner.destroyed = false;
        inner.modified = true;
    }

    /// Leave Authenticating, returning the pending CSRF state
    ///
    /// The session is Anonymous afterwards. Any other state is left as is
    /// and `None` is returned.
    pub async fn take_pending_state(&self) -> Option<String> {
        let mut inner = self.inner.lock().await;
        match std::mem::take(&mut inner.state) {
            SessionState::Authenticating { csrf_state } => {
                inner.modified = true;
                Some(csrf_state)
            }
            other => {
                inner.state = other;
                None
            }
        }
    }

    /// Attach a profile and rotate the session ID
    pub async fn login(&self, user: UserProfile) {
        let mut inner = self.inner.lock().await;
        inner.state = SessionState::Authenticated { user };
        inner.regenerate = true;
        inner.destroyed = false;
        inner.modified = true;
    }

    /// Back to Anonymous; the stored session and cookie are removed
    pub async fn logout(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = SessionState::Anonymous;
        inner.destroyed = true;
        inner.modified = true;
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("session layer is not installed")))
    }
}

// =============================================================================
// Tokens and cookie signing
// =============================================================================

/// Random URL-safe token with `bytes` bytes of entropy
pub fn generate_token(bytes: usize) -> String {
    use rand::RngCore;

    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// Generate a new session ID
pub fn generate_session_id() -> String {
    generate_token(32)
}

fn mac_for(session_id: &str, secret: &str) -> Result<HmacSha256, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid session secret: {e}")))?;
    mac.update(session_id.as_bytes());
    Ok(mac)
}

/// Sign a session ID for use as a cookie value
pub fn sign_session_id(session_id: &str, secret: &str) -> Result<String, AppError> {
    let signature = mac_for(session_id, secret)?.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{}.{}", session_id, signature_b64))
}

/// Verify a signed cookie value and return the session ID
///
/// # Errors
/// Returns `Unauthorized` if the value is malformed or the signature
/// does not match.
pub fn verify_session_cookie(value: &str, secret: &str) -> Result<String, AppError> {
    let (session_id, signature_b64) = value.split_once('.').ok_or(AppError::Unauthorized)?;
    if session_id.is_empty() {
        return Err(AppError::Unauthorized);
    }

    let signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized)?;
    mac_for(session_id, secret)?
        .verify_slice(&signature)
        .map_err(|_| AppError::Unauthorized)?;

    Ok(session_id.to_string())
}

// =============================================================================
// Middleware
// =============================================================================

/// Resolve the cookie to a live session, or start an anonymous one
async fn load_session(state: &AppState, jar: &CookieJar) -> Result<Session, AppError> {
    let auth = &state.config.auth;
    let Some(cookie) = jar.get(&auth.cookie_name) else {
        return Ok(Session::anonymous());
    };

    let session_id = match verify_session_cookie(cookie.value(), &auth.session_secret) {
        Ok(id) => id,
        Err(_) => {
            tracing::debug!("Ignoring session cookie with a bad signature");
            return Ok(Session::anonymous());
        }
    };

    let Some(record) = state.sessions.load(&session_id).await? else {
        return Ok(Session::anonymous());
    };

    let session_state = match (record.user, record.oauth_state) {
        (Some(encoded), _) => match state.codec.decode(&encoded) {
            Ok(user) => SessionState::Authenticated { user },
            Err(error) => {
                tracing::warn!(%error, "Discarding session with an undecodable profile");
                SessionState::Anonymous
            }
        },
        (None, Some(csrf_state)) => SessionState::Authenticating { csrf_state },
        (None, None) => SessionState::Anonymous,
    };

    Ok(Session::new(Some(session_id), session_state))
}

fn session_cookie(state: &AppState, value: String, max_age: i64) -> Cookie<'static> {
    Cookie::build((state.config.auth.cookie_name.clone(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.should_use_secure_cookies())
        .max_age(time::Duration::seconds(max_age))
        .build()
}

fn removal_cookie(state: &AppState) -> Cookie<'static> {
    Cookie::build((state.config.auth.cookie_name.clone(), ""))
        .path("/")
        .build()
}

/// Extend an untouched session without rewriting it
///
/// The record may have been destroyed or rotated by a concurrent request
/// since it was loaded; in that case nothing is written and no cookie is
/// issued.
async fn refresh_session(
    state: &AppState,
    inner: &SessionInner,
    jar: CookieJar,
) -> Result<CookieJar, AppError> {
    let auth = &state.config.auth;
    let Some(id) = &inner.id else {
        return Ok(jar);
    };

    match &inner.state {
        SessionState::Authenticated { .. } => {
            let expires_at = Utc::now() + Duration::seconds(auth.session_max_age);
            if !state.sessions.touch(id, expires_at).await? {
                return Ok(jar);
            }
            let signed = sign_session_id(id, &auth.session_secret)?;
            Ok(jar.add(session_cookie(state, signed, auth.session_max_age)))
        }
        // Handshakes keep the deadline set when they started
        SessionState::Authenticating { .. } => Ok(jar),
        // Stored record no longer decodes
        SessionState::Anonymous => {
            state.sessions.destroy(id).await?;
            Ok(jar.remove(removal_cookie(state)))
        }
    }
}

/// Write the session back to the store and update the cookie
async fn persist_session(
    state: &AppState,
    session: &Session,
    jar: CookieJar,
) -> Result<CookieJar, AppError> {
    let inner = session.inner.lock().await;
    if !inner.modified {
        return refresh_session(state, &inner, jar).await;
    }

    let auth = &state.config.auth;
    let now = Utc::now();

    let (record, max_age) = match (&inner.state, inner.destroyed) {
        (SessionState::Authenticated { user }, false) => (
            SessionRecord {
                user: Some(state.codec.encode(user)?),
                oauth_state: None,
                expires_at: now + Duration::seconds(auth.session_max_age),
            },
            auth.session_max_age,
        ),
        (SessionState::Authenticating { csrf_state }, false) => (
            SessionRecord {
                user: None,
                oauth_state: Some(csrf_state.clone()),
                expires_at: now + Duration::seconds(auth.handshake_max_age),
            },
            auth.handshake_max_age,
        ),
        _ => {
            // Nothing worth keeping: forget whatever the cookie pointed at
            return match &inner.id {
                Some(id) => {
                    state.sessions.destroy(id).await?;
                    Ok(jar.remove(removal_cookie(state)))
                }
                None => Ok(jar),
            };
        }
    };

    let id = match (&inner.id, inner.regenerate) {
        (Some(id), false) => id.clone(),
        (previous, _) => {
            if let Some(previous) = previous {
                state.sessions.destroy(previous).await?;
            }
            generate_session_id()
        }
    };
    state.sessions.save(&id, record).await?;

    let signed = sign_session_id(&id, &auth.session_secret)?;
    Ok(jar.add(session_cookie(state, signed, max_age)))
}

/// Session middleware
///
/// Attaches a [`Session`] to every request and persists it afterwards.
/// Expiry is rolling: every request that finds a live authenticated
/// session extends it. Only sessions a handler changed are rewritten.
/// A pending handshake expires `auth.handshake_max_age` after it started.
///
/// # Usage
/// ```ignore
/// let app = Router::new()
///     .route("/", get(home))
///     .layer(middleware::from_fn_with_state(state, session_layer));
/// ```
pub async fn session_layer(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = load_session(&state, &jar).await?;
    request.extensions_mut().insert(session.clone());

    let response = next.run(request).await;

    let jar = persist_session(&state, &session, jar).await?;
    Ok((jar, response).into_response())
}
