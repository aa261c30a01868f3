//! E2E tests for the operational endpoints.

use quill_test_utils::*;
use reqwest::StatusCode;

#[tokio::test]
async fn test_health_returns_ok() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;

    let response = server.get("/health", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "OK");

    Ok(())
}

#[tokio::test]
async fn test_ready_tracks_store_availability() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;

    let ready = server.get("/ready", None).await?;
    assert_eq!(ready.status(), StatusCode::OK);
    let body: serde_json::Value = ready.json().await?;
    assert_eq!(body["status"].as_str(), Some("ready"));

    server.memory().set_unavailable(true);
    let not_ready = server.get("/ready", None).await?;
    assert_eq!(not_ready.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = not_ready.json().await?;
    assert_eq!(body["status"].as_str(), Some("not_ready"));

    server.memory().set_unavailable(false);
    let recovered = server.get("/ready", None).await?;
    assert_eq!(recovered.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;

    let response = server.get("/metrics", None).await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_unknown_route_is_not_found() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;

    let response = server.get("/api/v1/nothing-here", None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}
