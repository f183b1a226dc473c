//! GitHub OAuth authentication
//!
//! Handles:
//! - GitHub OAuth flow
//! - Session lifecycle and storage
//! - Authentication gate

pub mod codec;
mod middleware;
mod oauth;
pub mod provider;
pub mod session;
pub mod store;

pub use codec::{JsonSessionCodec, SessionCodec};
pub use middleware::{
    CurrentUser, GateDecision, LOGIN_PATH, MaybeUser, gate, redirect_found, require_auth,
};
pub use oauth::auth_router;
pub use provider::{GitHubProvider, IdentityProvider, UserProfile};
pub use session::{Session, SessionState, session_layer, sign_session_id, verify_session_cookie};
pub use store::{MemorySessionStore, SessionRecord, SessionStore};
