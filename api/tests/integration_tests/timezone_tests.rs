//! Integration tests for the timezone endpoint.

use axum::http::StatusCode;
use serde_json::json;
use shared::time::normalize_timezone;

use super::common::{post_json, test_app, test_app_in};

#[tokio::test]
async fn test_canonical_forms() {
    let (app, _) = test_app();

    for (input, expected) in [
        ("", "UTC"),
        ("utc", "UTC"),
        ("-3:30", "-03:30"),
        ("asia/shanghai", "Asia/Shanghai"),
        ("+25:00", "UTC"),
    ] {
        let (status, response) =
            post_json(app.clone(), "/api/v1/timezone", json!({"timezone": input})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["timezone"], expected, "input {input:?}");
    }
}

#[tokio::test]
async fn test_label_is_empty_for_server_zone() {
    let (app, _) = test_app_in(normalize_timezone("Asia/Shanghai"));

    let (_, response) =
        post_json(app.clone(), "/api/v1/timezone", json!({"timezone": "+08:00"})).await;
    assert_eq!(response["label"], "");

    let (_, response) = post_json(app, "/api/v1/timezone", json!({"timezone": "+09:00"})).await;
    assert_eq!(response["label"], "+09");
}
