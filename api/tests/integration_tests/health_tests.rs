//! Integration tests for health check and general API functionality.

use axum::http::StatusCode;

use super::common::{get, test_app};

#[tokio::test]
async fn test_health_check() {
    let (app, backend) = test_app();

    let (status, response) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "ok");
    assert_eq!(response["timezone"], "UTC");
    assert!(backend.executed().is_empty());
}

#[tokio::test]
async fn test_cors_headers_present() {
    let (app, _) = test_app();
    let response = tower::ServiceExt::oneshot(
        app,
        axum::http::Request::builder()
            .uri("/health")
            .header("origin", "http://localhost:5173")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    assert!(response.headers().contains_key("access-control-allow-origin"));
}
