//! E2E tests for refresh rotation and sign-out.

use quill_service::models::Role;
use quill_test_utils::*;
use reqwest::StatusCode;
use serde_json::json;

async fn sign_out(
    server: &TestServer,
    refresh_token: &str,
    body: Option<serde_json::Value>,
) -> Result<reqwest::Response, anyhow::Error> {
    let mut request = server
        .client()
        .post(format!("{}/api/v1/auth/sign-out", server.url()))
        .header(
            reqwest::header::COOKIE,
            format!("refresh_token={}", refresh_token),
        );
    if let Some(body) = body {
        request = request.json(&body);
    }
    Ok(request.send().await?)
}

/// A refresh token is good for exactly one rotation.
#[tokio::test]
async fn test_refresh_rotates_single_use() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    server.add_user(TEST_USER_ALICE, "alice", &[Role::Writer]).await;
    let first = server.sign_in("alice", TEST_PASSWORD).await?;

    // First use succeeds and sets a new cookie
    let rotated = TestServer::signed_in(server.refresh(&first.refresh_token).await?).await?;
    assert_ne!(rotated.refresh_token, first.refresh_token);
    assert_ne!(rotated.token_id, first.token_id);
    rotated
        .access_token
        .assert_kind("access")
        .assert_for_subject(TEST_USER_ALICE);

    // Replay of the consumed token fails
    let replay = server.refresh(&first.refresh_token).await?;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    // The rotated one still works, and so do both access tokens
    let again = server.refresh(&rotated.refresh_token).await?;
    assert_eq!(again.status(), StatusCode::OK);
    for token in [&first.access_token, &rotated.access_token] {
        let response = server.get("/api/v1/account", Some(token)).await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    Ok(())
}

/// The refresh endpoint only reads the cookie.
#[tokio::test]
async fn test_refresh_requires_refresh_cookie() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    server.add_user(TEST_USER_ALICE, "alice", &[Role::Writer]).await;
    let tokens = server.sign_in("alice", TEST_PASSWORD).await?;

    let as_bearer = server
        .client()
        .post(format!("{}/api/v1/auth/refresh", server.url()))
        .bearer_auth(&tokens.refresh_token)
        .send()
        .await?;
    assert_eq!(as_bearer.status(), StatusCode::UNAUTHORIZED);

    let access_as_cookie = server.refresh(&tokens.access_token).await?;
    assert_eq!(access_as_cookie.status(), StatusCode::UNAUTHORIZED);

    let forged = TestTokenBuilder::new()
        .of_kind("refresh")
        .for_user(TEST_USER_ALICE)
        .build();
    let response = server.refresh(&forged).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

/// Sign-out revokes the refresh token, clears the cookie, and optionally
/// revokes a named access token.
#[tokio::test]
async fn test_sign_out_with_access_token_id() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    server.add_user(TEST_USER_ALICE, "alice", &[Role::Writer]).await;
    let tokens = server.sign_in("alice", TEST_PASSWORD).await?;

    let response = sign_out(
        &server,
        &tokens.refresh_token,
        Some(json!({ "access_token_id": tokens.token_id })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cleared.starts_with("refresh_token="));
    assert!(cleared.contains("Max-Age=0"));

    let refresh = server.refresh(&tokens.refresh_token).await?;
    assert_eq!(refresh.status(), StatusCode::UNAUTHORIZED);

    let account = server
        .get("/api/v1/account", Some(&tokens.access_token))
        .await?;
    assert_eq!(account.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

/// Without a body only the refresh token is revoked.
#[tokio::test]
async fn test_sign_out_without_body_keeps_access_token() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    server.add_user(TEST_USER_ALICE, "alice", &[Role::Writer]).await;
    let tokens = server.sign_in("alice", TEST_PASSWORD).await?;

    let response = sign_out(&server, &tokens.refresh_token, None).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let refresh = server.refresh(&tokens.refresh_token).await?;
    assert_eq!(refresh.status(), StatusCode::UNAUTHORIZED);

    let account = server
        .get("/api/v1/account", Some(&tokens.access_token))
        .await?;
    assert_eq!(account.status(), StatusCode::OK);
    assert_eq!(server.memory().revoked_count().await, 1);

    Ok(())
}

/// Signing out twice with the same cookie fails the second time.
#[tokio::test]
async fn test_sign_out_twice_rejected() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    server.add_user(TEST_USER_ALICE, "alice", &[Role::Writer]).await;
    let tokens = server.sign_in("alice", TEST_PASSWORD).await?;

    let first = sign_out(&server, &tokens.refresh_token, None).await?;
    assert_eq!(first.status(), StatusCode::NO_CONTENT);

    let second = sign_out(&server, &tokens.refresh_token, None).await?;
    assert_eq!(second.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}
