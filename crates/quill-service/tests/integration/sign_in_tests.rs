//! E2E tests for sign-in and the access track.
//!
//! Tests follow the convention: `test_<feature>_<scenario>_<expected_result>`

use quill_service::models::Role;
use quill_test_utils::*;
use reqwest::StatusCode;
use serde_json::json;

/// Correct credentials yield an access token in the body and a refresh
/// token in an HttpOnly cookie scoped to the auth endpoints.
#[tokio::test]
async fn test_sign_in_happy_path() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestServer::spawn().await?;
    server.add_user(TEST_USER_ALICE, "alice", &[Role::Writer]).await;

    // Act
    let response = server
        .client()
        .post(format!("{}/api/v1/auth/sign-in", server.url()))
        .json(&json!({ "login": "alice", "password": TEST_PASSWORD }))
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .expect("sign-in should set the refresh cookie");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/api/v1/auth"));

    let tokens = TestServer::signed_in(response).await?;
    tokens
        .access_token
        .assert_valid_jwt()
        .assert_kind("access")
        .assert_for_subject(TEST_USER_ALICE)
        .assert_token_id(&tokens.token_id)
        .assert_lifetime(server.config().access_token_lifetime().num_seconds());
    tokens
        .refresh_token
        .assert_valid_jwt()
        .assert_kind("refresh")
        .assert_for_subject(TEST_USER_ALICE);

    Ok(())
}

/// Email works as the credential handle, case-insensitively.
#[tokio::test]
async fn test_sign_in_with_email_succeeds() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    server.add_user(TEST_USER_ALICE, "alice", &[Role::Writer]).await;

    let tokens = server.sign_in("Alice@Example.com", TEST_PASSWORD).await?;
    tokens.access_token.assert_for_subject(TEST_USER_ALICE);

    Ok(())
}

/// Unknown user and wrong password are indistinguishable.
#[tokio::test]
async fn test_sign_in_bad_credentials_rejected() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    server.add_user(TEST_USER_ALICE, "alice", &[Role::Writer]).await;

    let mut bodies = Vec::new();
    for (login, password) in [("alice", "wrong password"), ("mallory", TEST_PASSWORD)] {
        let response = server
            .client()
            .post(format!("{}/api/v1/auth/sign-in", server.url()))
            .json(&json!({ "login": login, "password": password }))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(reqwest::header::SET_COOKIE).is_none());
        bodies.push(response.json::<serde_json::Value>().await?);
    }

    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[0]["error"]["code"].as_str(), Some("INVALID_CREDENTIALS"));

    Ok(())
}

/// The access token opens the account endpoint; hand-crafted bad tokens
/// all get the same 401.
#[tokio::test]
async fn test_access_token_gates_account() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    server.add_user(TEST_USER_ALICE, "alice", &[Role::Writer]).await;
    let tokens = server.sign_in("alice", TEST_PASSWORD).await?;

    let response = server
        .get("/api/v1/account", Some(&tokens.access_token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["username"].as_str(), Some("alice"));
    assert_eq!(body["roles"], json!(["Writer"]));

    let rejected = [
        // Correctly signed but never recorded as issued
        TestTokenBuilder::new().for_user(TEST_USER_ALICE).build(),
        TestTokenBuilder::new()
            .for_user(TEST_USER_ALICE)
            .expired_seconds_ago(30)
            .build(),
        TestTokenBuilder::new()
            .for_user(TEST_USER_ALICE)
            .signed_with(FOREIGN_SIGNING_SECRET)
            .build(),
        tokens.refresh_token.clone(),
        "not-a-jwt".to_string(),
    ];

    let mut bodies = Vec::new();
    for token in rejected {
        let response = server.get("/api/v1/account", Some(&token)).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        bodies.push(response.json::<serde_json::Value>().await?);
    }
    assert!(bodies.windows(2).all(|w| w[0] == w[1]));

    Ok(())
}

/// A token for an identity that does not exist is rejected.
#[tokio::test]
async fn test_token_for_unknown_identity_rejected() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    let token = TestTokenBuilder::new().for_user(TEST_USER_UNKNOWN).build();

    let response = server.get("/api/v1/account", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

/// No Authorization header at all.
#[tokio::test]
async fn test_missing_token_rejected() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;

    let response = server.get("/api/v1/account", None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"].as_str(), Some("UNAUTHENTICATED"));

    Ok(())
}
