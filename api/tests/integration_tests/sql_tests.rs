//! Integration tests for the SQL editor endpoints.

use axum::http::StatusCode;
use serde_json::json;

use super::common::{get, post_json, post_json_text, test_app};

#[tokio::test]
async fn test_split_ignores_quoted_and_commented_semicolons() {
    let (app, _) = test_app();

    let (status, response) = post_json(
        app,
        "/api/v1/sql/split",
        json!({"sql": "SELECT ';'; -- a;\nSELECT 2;"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let statements = response["statements"].as_array().unwrap();
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[0]["text"], "SELECT ';';");
    assert!(response.get("active").is_none());
}

#[tokio::test]
async fn test_format_falls_back_on_invalid_sql() {
    let (app, _) = test_app();

    let (status, response) =
        post_json(app, "/api/v1/sql/format", json!({"sql": "SELEKT 1"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["sql"], "SELEKT 1;");
}

#[tokio::test]
async fn test_run_with_absolute_range() {
    let (app, backend) = test_app();

    let (status, response) = post_json(
        app,
        "/api/v1/sql/run",
        json!({
            "sql": "SELECT count(*) FROM cpu WHERE ts >= $timestart AND ts <= $timeend",
            "timeRange": {
                "type": "absolute",
                "start": "2024-01-01T00:00:00Z",
                "end": "2024-01-01T01:00:00Z"
            }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let expected = "SELECT count(*) FROM cpu \
                    WHERE ts >= '2024-01-01T00:00:00.000Z' AND ts <= '2024-01-01T01:00:00.000Z'";
    assert_eq!(response["sql"], expected);
    assert_eq!(response["result"]["output"][0]["records"]["rows"][0][0], expected);
    assert_eq!(backend.executed(), vec![expected.to_string()]);
}

#[tokio::test]
async fn test_run_without_range_uses_default_window() {
    let (app, backend) = test_app();

    let (status, _) = post_json(
        app,
        "/api/v1/sql/run",
        json!({"sql": "SELECT * FROM t WHERE ts > $timestart AND ts < $timeend"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        backend.executed(),
        vec!["SELECT * FROM t WHERE ts > now() - Interval '10m' AND ts < now()".to_string()]
    );
}

#[tokio::test]
async fn test_run_reports_backend_errors() {
    let (app, _) = test_app();

    let (status, response) =
        post_json(app, "/api/v1/sql/run", json!({"sql": "SELECT * FROM broken"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(response["error"], "backend_error");
    assert!(response["message"].as_str().unwrap().contains("Table not found"));
}

#[tokio::test]
async fn test_list_databases() {
    let (app, backend) = test_app();

    let (status, response) = get(app, "/api/v1/databases").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["databases"], json!(["greptime_private", "public"]));
    assert_eq!(backend.executed(), vec!["SHOW DATABASES".to_string()]);
}

#[tokio::test]
async fn test_run_exports_csv() {
    let (app, backend) = test_app();

    let (status, content_type, body) = post_json_text(
        app,
        "/api/v1/sql/run",
        json!({
            "sql": "SELECT * FROM t WHERE ts > $timestart",
            "timeRange": {"type": "relative", "minutes": 5},
            "format": "csv"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("text/csv"));
    let expected = "SELECT * FROM t WHERE ts > now() - Interval '5m'";
    assert_eq!(body, format!("sql\n{expected}\n"));
    assert_eq!(backend.executed(), vec![expected.to_string()]);
}

#[tokio::test]
async fn test_split_reports_table_under_cursor() {
    let (app, _) = test_app();

    let (_, response) = post_json(
        app,
        "/api/v1/sql/split",
        json!({"sql": "SELECT * FROM logs;\nSHOW TABLES;", "cursor": 19}),
    )
    .await;

    assert_eq!(response["active"]["index"], 0);
    assert_eq!(response["active"]["table"], "logs");
}
