//! Common test utilities for E2E tests

use std::sync::Arc;

use async_trait::async_trait;
use gatekeeper::auth::{IdentityProvider, UserProfile};
use gatekeeper::error::AppError;
use gatekeeper::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Authorization code the stub provider accepts
pub const GOOD_CODE: &str = "good-code";

/// Identity provider stand-in
///
/// Accepts [`GOOD_CODE`] and answers with a profile whose ID is `42`.
pub struct StubProvider;

#[async_trait]
impl IdentityProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn authorize_url(&self, state: &str) -> String {
        format!("https://idp.test/authorize?client_id=test-client-id&state={state}")
    }

    async fn exchange(&self, code: &str) -> Result<UserProfile, AppError> {
        if code == GOOD_CODE {
            Ok(UserProfile::new("42"))
        } else {
            Err(AppError::IdentityProvider(format!("unknown code {code}")))
        }
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _static_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        Self::with_max_age(604_800).await
    }

    /// Create a test server whose sessions expire after `session_max_age` seconds
    pub async fn with_max_age(session_max_age: i64) -> Self {
        // Static files served for unmatched paths
        let static_dir = TempDir::new().unwrap();
        std::fs::write(static_dir.path().join("style.css"), "body { margin: 0; }").unwrap();

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                public_url: Some("http://localhost:5000".to_string()),
                static_dir: static_dir.path().to_path_buf(),
            },
            auth: config::AuthConfig {
                session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
                session_max_age,
                handshake_max_age: 600,
                cookie_name: "session".to_string(),
                sweep_interval_seconds: 60,
                github: config::GitHubOAuthConfig {
                    client_id: "test-client-id".to_string(),
                    client_secret: "test-client-secret".to_string(),
                    scope: vec!["user".to_string()],
                    authorize_url: "https://idp.test/authorize".to_string(),
                    token_url: "https://idp.test/token".to_string(),
                    api_url: "https://idp.test/api".to_string(),
                    timeout_seconds: 5,
                },
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };
        config.validate().unwrap();

        gatekeeper::metrics::init_metrics();

        // Initialize app state
        let state = AppState::with_provider(config, Arc::new(StubProvider));

        // Redirects are asserted on, never followed
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        // Build router
        let app = gatekeeper::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            _static_dir: static_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// GET `path`, sending `cookie` if given
    pub async fn get(&self, path: &str, cookie: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(cookie) = cookie {
            request = request.header("Cookie", cookie);
        }
        request.send().await.expect("request succeeds")
    }

    /// Start the OAuth handshake, returning the session cookie and CSRF state
    pub async fn begin_login(&self) -> (String, String) {
        let response = self.get("/auth/github", None).await;
        assert_eq!(response.status(), 302);

        let state = location(&response)
            .split("state=")
            .nth(1)
            .expect("state in authorize URL")
            .to_string();
        let cookie = session_cookie(&response).expect("pending session cookie");
        (cookie, state)
    }

    /// Run the whole sign-in flow against the stub provider
    ///
    /// Returns the authenticated session cookie.
    pub async fn login(&self) -> String {
        let (cookie, state) = self.begin_login().await;

        let response = self
            .get(
                &format!("/auth/github/callback?code={GOOD_CODE}&state={state}"),
                Some(&cookie),
            )
            .await;
        assert_eq!(response.status(), 302);
        assert_eq!(location(&response), "/");

        session_cookie(&response).expect("authenticated session cookie")
    }
}

/// `Location` header of a redirect
pub fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
}

/// All `Set-Cookie` header values
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(ToString::to_string))
        .collect()
}

/// `session=...` pair from a non-empty session cookie, ready for a `Cookie` header
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    set_cookies(response)
        .into_iter()
        .filter_map(|v| v.split(';').next().map(str::to_string))
        .find(|pair| pair.starts_with("session=") && pair.len() > "session=".len())
}
