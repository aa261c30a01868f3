//! E2E tests for the role-gated route groups.

use quill_service::models::Role;
use quill_test_utils::*;
use reqwest::StatusCode;
use serde_json::json;

/// Sign in, reach a Writer route, fail without a token, be forbidden from
/// an Editor route.
#[tokio::test]
async fn test_writer_end_to_end() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    server.add_user(TEST_USER_ALICE, "alice", &[Role::Writer]).await;
    server.add_user(TEST_USER_BOB, "bob", &[Role::Writer]).await;
    let tokens = server.sign_in("alice", TEST_PASSWORD).await?;

    let own = server
        .get("/api/v1/account/sessions", Some(&tokens.access_token))
        .await?;
    assert_eq!(own.status(), StatusCode::OK);
    let body: serde_json::Value = own.json().await?;
    assert_eq!(body["sessions"].as_array().map(Vec::len), Some(2));

    let anonymous = server.get("/api/v1/account/sessions", None).await?;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let editor_route = format!("/api/v1/users/{}/sessions", TEST_USER_BOB);
    let forbidden = server
        .get(&editor_route, Some(&tokens.access_token))
        .await?;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = forbidden.json().await?;
    assert_eq!(body["error"]["code"].as_str(), Some("FORBIDDEN"));
    assert_eq!(body["error"]["required_role"].as_str(), Some("Editor"));

    Ok(())
}

/// Gates match exact levels: holding Editor and Writer passes both.
#[tokio::test]
async fn test_editor_and_writer_reach_both_groups() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    server
        .add_user(TEST_USER_CAROL, "carol", &[Role::Writer, Role::Editor])
        .await;
    server.add_user(TEST_USER_BOB, "bob", &[Role::Writer]).await;
    let tokens = server.sign_in("carol", TEST_PASSWORD).await?;

    let own = server
        .get("/api/v1/account/sessions", Some(&tokens.access_token))
        .await?;
    assert_eq!(own.status(), StatusCode::OK);

    let other = server
        .get(
            &format!("/api/v1/users/{}/sessions", TEST_USER_BOB),
            Some(&tokens.access_token),
        )
        .await?;
    assert_eq!(other.status(), StatusCode::OK);

    let missing = server
        .get(
            &format!("/api/v1/users/{}/sessions", TEST_USER_UNKNOWN),
            Some(&tokens.access_token),
        )
        .await?;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    Ok(())
}

/// An Admin revokes every session of another identity.
#[tokio::test]
async fn test_admin_revokes_all_sessions() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    server.add_user(TEST_USER_DAVE, "dave", &[Role::Admin]).await;
    server.add_user(TEST_USER_BOB, "bob", &[Role::Writer]).await;
    let admin = server.sign_in("dave", TEST_PASSWORD).await?;
    let victim = server.sign_in("bob", TEST_PASSWORD).await?;

    let response = server
        .client()
        .post(format!(
            "{}/api/v1/users/{}/sessions/revoke",
            server.url(),
            TEST_USER_BOB
        ))
        .bearer_auth(&admin.access_token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["revoked_access_tokens"], json!(1));
    assert_eq!(body["dropped_refresh_tokens"], json!(1));

    let account = server
        .get("/api/v1/account", Some(&victim.access_token))
        .await?;
    assert_eq!(account.status(), StatusCode::UNAUTHORIZED);
    let refresh = server.refresh(&victim.refresh_token).await?;
    assert_eq!(refresh.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

/// Only a SuperAdmin replaces role sets; unknown names are rejected.
#[tokio::test]
async fn test_super_admin_sets_roles() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    server.add_user(TEST_USER_ALICE, "alice", &[Role::SuperAdmin]).await;
    server.add_user(TEST_USER_BOB, "bob", &[Role::Writer]).await;
    server.add_user(TEST_USER_DAVE, "dave", &[Role::Admin]).await;
    let root = server.sign_in("alice", TEST_PASSWORD).await?;
    let admin = server.sign_in("dave", TEST_PASSWORD).await?;
    let bob = server.sign_in("bob", TEST_PASSWORD).await?;

    let url = format!("{}/api/v1/users/{}/roles", server.url(), TEST_USER_BOB);

    let denied = server
        .client()
        .put(&url)
        .bearer_auth(&admin.access_token)
        .json(&json!({ "roles": ["Writer", "Editor"] }))
        .send()
        .await?;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let bad = server
        .client()
        .put(&url)
        .bearer_auth(&root.access_token)
        .json(&json!({ "roles": ["Owner"] }))
        .send()
        .await?;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    let ok = server
        .client()
        .put(&url)
        .bearer_auth(&root.access_token)
        .json(&json!({ "roles": ["Writer", "Editor"] }))
        .send()
        .await?;
    assert_eq!(ok.status(), StatusCode::OK);
    let body: serde_json::Value = ok.json().await?;
    assert_eq!(body["roles"], json!(["Editor", "Writer"]));

    // Bob's existing token picks up the new role on the next request
    let promoted = server
        .get(
            &format!("/api/v1/users/{}/sessions", TEST_USER_ALICE),
            Some(&bob.access_token),
        )
        .await?;
    assert_eq!(promoted.status(), StatusCode::OK);

    Ok(())
}

/// A SuperAdmin provisions an account that can sign in right away.
#[tokio::test]
async fn test_super_admin_creates_account() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    server.add_user(TEST_USER_ALICE, "alice", &[Role::SuperAdmin]).await;
    server.add_user(TEST_USER_DAVE, "dave", &[Role::Admin]).await;
    let root = server.sign_in("alice", TEST_PASSWORD).await?;
    let admin = server.sign_in("dave", TEST_PASSWORD).await?;

    let url = format!("{}/api/v1/users", server.url());
    let body = json!({
        "username": "erin",
        "email": "erin@example.com",
        "password": TEST_PASSWORD,
        "roles": ["Editor"],
    });

    let denied = server
        .client()
        .post(&url)
        .bearer_auth(&admin.access_token)
        .json(&body)
        .send()
        .await?;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let created = server
        .client()
        .post(&url)
        .bearer_auth(&root.access_token)
        .json(&body)
        .send()
        .await?;
    assert_eq!(created.status(), StatusCode::CREATED);
    let account: serde_json::Value = created.json().await?;
    assert_eq!(account["username"].as_str(), Some("erin"));
    assert_eq!(account["roles"], json!(["Editor"]));

    let duplicate = server
        .client()
        .post(&url)
        .bearer_auth(&root.access_token)
        .json(&body)
        .send()
        .await?;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    let error: serde_json::Value = duplicate.json().await?;
    assert_eq!(error["error"]["code"].as_str(), Some("ALREADY_EXISTS"));

    let erin = server.sign_in("erin", TEST_PASSWORD).await?;
    let sessions = server
        .get(
            &format!("/api/v1/users/{}/sessions", TEST_USER_DAVE),
            Some(&erin.access_token),
        )
        .await?;
    assert_eq!(sessions.status(), StatusCode::OK);

    Ok(())
}
