//! Integration tests for the table browser endpoints.

use axum::http::StatusCode;
use serde_json::json;

use super::common::{get, post_json, test_app};

#[tokio::test]
async fn test_list_tables() {
    let (app, backend) = test_app();

    let (status, response) = get(app, "/api/v1/tables").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["tables"], json!(["logs"]));
    assert_eq!(backend.executed(), vec!["SHOW TABLES".to_string()]);
}

#[tokio::test]
async fn test_describe_prefers_time_index_over_first_timestamp() {
    let (app, backend) = test_app();

    let (status, response) = get(app, "/api/v1/tables/logs").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["columns"][0]["name"], "created");
    assert_eq!(response["tsColumn"]["name"], "greptime_timestamp");
    assert_eq!(backend.executed(), vec!["DESC TABLE \"logs\"".to_string()]);
}

#[tokio::test]
async fn test_detected_column_drives_builder() {
    let (app, _) = test_app();

    let (_, table) = get(app.clone(), "/api/v1/tables/logs").await;
    let (status, response) = post_json(
        app,
        "/api/v1/builder/sql",
        json!({
            "form": {"table": "logs", "tsColumn": table["tsColumn"]},
            "timeRange": {"type": "relative", "minutes": 5}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response["sql"],
        "SELECT * FROM \"logs\" WHERE greptime_timestamp <= now() \
         AND greptime_timestamp >= now() - Interval '5m' LIMIT 1000"
    );
}
