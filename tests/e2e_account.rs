//! E2E tests for the guarded account page

mod common;

use common::{TestServer, location, session_cookie};

#[tokio::test]
async fn test_account_requires_sign_in() {
    let server = TestServer::new().await;

    let response = server.get("/account", None).await;
    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_account_lifecycle() {
    let server = TestServer::new().await;

    // Anonymous visitors are sent to the login page
    let response = server.get("/account", None).await;
    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), "/login");

    // Sign in through the stub provider
    let cookie = server.login().await;

    let response = server.get("/account", Some(&cookie)).await;
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("<dd>42</dd>"));

    // Logging out invalidates the session server-side
    let response = server.get("/logout", Some(&cookie)).await;
    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), "/");

    let response = server.get("/account", Some(&cookie)).await;
    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_account_keeps_working_across_requests() {
    let server = TestServer::new().await;
    let cookie = server.login().await;

    for _ in 0..3 {
        let response = server.get("/account", Some(&cookie)).await;
        assert_eq!(response.status(), 200);
        // Rolling expiry refreshes the cookie but keeps the same session ID
        if let Some(refreshed) = session_cookie(&response) {
            assert_eq!(refreshed, cookie);
        }
    }
}

#[tokio::test]
async fn test_tampered_cookie_is_anonymous() {
    let server = TestServer::new().await;
    let cookie = server.login().await;

    // Swap the signature for a different, well-formed one
    let (id, _) = cookie.rsplit_once('.').expect("signed session cookie");
    let forged = format!("{id}.AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");

    let response = server.get("/account", Some(&forged)).await;
    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), "/login");

    let response = server.get("/account", Some("session=garbage")).await;
    assert_eq!(response.status(), 302);
}

#[tokio::test]
async fn test_home_page_reflects_sign_in() {
    let server = TestServer::new().await;

    let response = server.get("/", None).await;
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains(r#"href="/login""#));
    assert!(!body.contains(r#"href="/logout""#));

    let cookie = server.login().await;
    let response = server.get("/", Some(&cookie)).await;
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains(r#"href="/logout""#));
    assert!(body.contains(r#"href="/account""#));
}

#[tokio::test]
async fn test_expired_session_is_anonymous() {
    let server = TestServer::with_max_age(1).await;
    let cookie = server.login().await;

    tokio::time::sleep(std::time::Duration::from_millis(2100)).await;

    let response = server.get("/account", Some(&cookie)).await;
    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), "/login");
}
