//! Identity provider client
//!
//! The OAuth handshake itself (authorization URL, code exchange, profile
//! fetch) lives behind [`IdentityProvider`] so routes and tests never talk
//! to GitHub directly.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{GitHubOAuthConfig, ServerConfig};
use crate::error::AppError;

/// User profile returned by the identity provider
///
/// Attached to the session on a successful callback and never mutated
/// afterwards. Only `id` is guaranteed to be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Provider-scoped user ID
    pub id: String,
    /// Login handle
    #[serde(default)]
    pub username: Option<String>,
    /// Display name
    #[serde(default)]
    pub display_name: Option<String>,
    /// Public profile page
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Verified addresses, primary first
    #[serde(default)]
    pub emails: Vec<String>,
    /// Provider name (e.g. "github")
    #[serde(default)]
    pub provider: String,
}

impl UserProfile {
    /// Profile carrying only an ID
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: None,
            display_name: None,
            profile_url: None,
            avatar_url: None,
            emails: Vec::new(),
            provider: String::new(),
        }
    }

    /// Best human-readable label: display name, then login, then ID
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(&self.id)
    }
}

/// Third-party OAuth identity provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short provider name, used in logs and stored profiles
    fn name(&self) -> &'static str;

    /// URL the browser is sent to in order to start the handshake
    fn authorize_url(&self, state: &str) -> String;

    /// Exchange an authorization code for the user's profile
    async fn exchange(&self, code: &str) -> Result<UserProfile, AppError>;
}

// =============================================================================
// GitHub
// =============================================================================

/// GitHub token response
///
/// GitHub answers 200 even for rejected codes, with `error` set instead
/// of `access_token`.
#[derive(Debug, Deserialize)]
struct GitHubTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GitHub user info
#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
    name: Option<String>,
    html_url: Option<String>,
    avatar_url: Option<String>,
    email: Option<String>,
}

/// GitHub email entry from `/user/emails`
#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

/// GitHub OAuth application client
pub struct GitHubProvider {
    config: GitHubOAuthConfig,
    callback_url: String,
    http_client: reqwest::Client,
}

impl GitHubProvider {
    /// Build a client for the configured OAuth application
    ///
    /// The callback URL is derived from the server's public URL.
    pub fn new(config: &GitHubOAuthConfig, server: &ServerConfig) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("gatekeeper/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config: config.clone(),
            callback_url: server.callback_url(),
            http_client,
        })
    }

    fn wants_emails(&self) -> bool {
        self.config
            .scope
            .iter()
            .any(|scope| scope == "user" || scope == "user:email")
    }

    async fn fetch_access_token(&self, code: &str) -> Result<String, AppError> {
        let response = self
            .http_client
            .post(&self.config.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.callback_url.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let token: GitHubTokenResponse = response.json().await?;
        match token {
            GitHubTokenResponse {
                access_token: Some(access_token),
                ..
            } => Ok(access_token),
            GitHubTokenResponse {
                error,
                error_description,
                ..
            } => Err(AppError::IdentityProvider(format!(
                "token exchange rejected: {}",
                error_description
                    .or(error)
                    .unwrap_or_else(|| "no access token in response".to_string())
            ))),
        }
    }

    async fn fetch_user(&self, access_token: &str) -> Result<GitHubUser, AppError> {
        let url = format!("{}/user", self.config.api_url.trim_end_matches('/'));
        let user = self
            .http_client
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(user)
    }

    async fn fetch_emails(&self, access_token: &str) -> Result<Vec<String>, AppError> {
        let url = format!("{}/user/emails", self.config.api_url.trim_end_matches('/'));
        let mut emails: Vec<GitHubEmail> = self
            .http_client
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        emails.retain(|email| email.verified);
        emails.sort_by_key(|email| !email.primary);
        Ok(emails.into_iter().map(|email| email.email).collect())
    }
}

#[async_trait]
impl IdentityProvider for GitHubProvider {
    fn name(&self) -> &'static str {
        "github"
    }

    fn authorize_url(&self, state: &str) -> String {
        let scope = self.config.scope.join(" ");
        match Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.callback_url.as_str()),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        ) {
            Ok(url) => url.into(),
            // Validated at startup
            Err(_) => self.config.authorize_url.clone(),
        }
    }

    async fn exchange(&self, code: &str) -> Result<UserProfile, AppError> {
        let access_token = self.fetch_access_token(code).await?;
        let user = self.fetch_user(&access_token).await?;

        let mut emails = Vec::new();
        if self.wants_emails() {
            match self.fetch_emails(&access_token).await {
                Ok(fetched) => emails = fetched,
                Err(error) => {
                    tracing::warn!(%error, github_id = user.id, "Failed to fetch GitHub emails");
                }
            }
        }
        if emails.is_empty() {
            emails.extend(user.email);
        }

        tracing::debug!(github_id = user.id, login = %user.login, "Fetched GitHub profile");

        Ok(UserProfile {
            id: user.id.to_string(),
            username: Some(user.login),
            display_name: user.name,
            profile_url: user.html_url,
            avatar_url: user.avatar_url,
            emails,
            provider: self.name().to_string(),
        })
    }
}
