//! Fault injection: an unreachable or slow store fails closed.

use quill_service::models::Role;
use quill_test_utils::*;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::time::Duration;

/// Sign-in with the store down is a 500, never a token.
#[tokio::test]
async fn test_sign_in_with_store_down_fails_closed() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    server.add_user(TEST_USER_ALICE, "alice", &[Role::Writer]).await;
    server.memory().set_unavailable(true);

    let result = server.sign_in("alice", TEST_PASSWORD).await;
    assert!(result.is_err());

    let response = server
        .client()
        .post(format!("{}/api/v1/auth/sign-in", server.url()))
        .json(&serde_json::json!({ "login": "alice", "password": TEST_PASSWORD }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"].as_str(), Some("INTERNAL_ERROR"));

    Ok(())
}

/// A valid access token is not accepted while revocation cannot be checked.
#[tokio::test]
async fn test_access_track_with_store_down_fails_closed() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    server.add_user(TEST_USER_ALICE, "alice", &[Role::Writer]).await;
    let tokens = server.sign_in("alice", TEST_PASSWORD).await?;

    server.memory().set_unavailable(true);
    let response = server
        .get("/api/v1/account", Some(&tokens.access_token))
        .await?;
    assert!(response.status().is_server_error());

    let refresh = server.refresh(&tokens.refresh_token).await?;
    assert!(refresh.status().is_server_error());

    // The refresh token was not consumed by the failed attempt
    server.memory().set_unavailable(false);
    let refresh = server.refresh(&tokens.refresh_token).await?;
    assert_eq!(refresh.status(), StatusCode::OK);

    Ok(())
}

/// Store calls slower than the per-request budget are cut off.
#[tokio::test]
async fn test_slow_store_exceeds_budget() -> Result<(), anyhow::Error> {
    let vars = HashMap::from([
        (
            "DATABASE_URL".to_string(),
            "postgresql://localhost/quill_test".to_string(),
        ),
        ("JWT_SECRET".to_string(), TEST_SIGNING_SECRET.to_string()),
        ("COOKIE_SECURE".to_string(), "false".to_string()),
        ("STORE_TIMEOUT_MS".to_string(), "100".to_string()),
    ]);
    let config = quill_service::config::Config::from_vars(&vars)?;
    let server = TestServer::spawn_with_config(config).await?;
    server.add_user(TEST_USER_ALICE, "alice", &[Role::Writer]).await;
    let tokens = server.sign_in("alice", TEST_PASSWORD).await?;

    server.memory().set_latency(Duration::from_millis(300));
    let response = server
        .get("/api/v1/account", Some(&tokens.access_token))
        .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    server.memory().set_latency(Duration::ZERO);
    let response = server
        .get("/api/v1/account", Some(&tokens.access_token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}
