//! E2E tests for health check and basic server functionality

mod common;

use common::TestServer;
use serde_json::Value;

#[tokio::test]
async fn test_root_reports_app() {
    let server = TestServer::new().await;

    let response = server.get("/", None).await;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["app"], "linko");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;

    let response = server.get("/api/health", None).await;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_api_responses_are_not_cached() {
    let server = TestServer::new().await;

    let response = server.get("/api/health", None).await;
    assert_eq!(
        response
            .headers()
            .get("cache-control")
            .and_then(|v| v.to_str().ok()),
        Some("no-cache")
    );
}

#[tokio::test]
async fn test_cors_headers() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/api/health"))
        .header("Origin", "https://app.example.com")
        .send()
        .await
        .unwrap();

    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_404_for_unknown_routes() {
    let server = TestServer::new().await;

    let response = server.get("/unknown/route", None).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let server = TestServer::new().await;

    let response = server.get("/metrics", None).await;
    assert_eq!(response.status(), 200);
}
