//! Integration tests for the query builder endpoint.
//!
//! Tests cover:
//! - The documented end-to-end scenario
//! - Relative ranges and the no-limit range
//! - Escaping and validation

use axum::http::StatusCode;
use serde_json::json;

use super::common::{post_json, test_app};

fn cpu_form() -> serde_json::Value {
    json!({
        "table": "cpu",
        "conditions": [{"field": "host", "operator": "=", "value": "h1", "fieldType": "String"}],
        "orderByField": "ts",
        "orderBy": "DESC",
        "limit": 100,
        "tsColumn": {"name": "ts"}
    })
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let (app, _) = test_app();

    let (status, response) = post_json(
        app,
        "/api/v1/builder/sql",
        json!({
            "form": cpu_form(),
            "timeRange": {
                "type": "absolute",
                "start": "2024-01-01T00:00:00Z",
                "end": "2024-01-02T00:00:00Z"
            }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response["sql"],
        "SELECT * FROM \"cpu\" WHERE \"host\" = 'h1' AND ts <= '2024-01-02T00:00:00.000Z' \
         AND ts >= '2024-01-01T00:00:00.000Z' ORDER BY \"ts\" DESC LIMIT 100"
    );
}

#[tokio::test]
async fn test_relative_range_uses_sql_expressions() {
    let (app, _) = test_app();

    let (status, response) = post_json(
        app,
        "/api/v1/builder/sql",
        json!({"form": cpu_form(), "timeRange": {"type": "relative", "minutes": 15}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let sql = response["sql"].as_str().unwrap();
    assert!(sql.contains("ts <= now() AND ts >= now() - Interval '15m'"));
}

#[tokio::test]
async fn test_no_range_omits_time_condition() {
    let (app, _) = test_app();

    let (_, response) = post_json(app, "/api/v1/builder/sql", json!({"form": cpu_form()})).await;

    assert_eq!(
        response["sql"],
        "SELECT * FROM \"cpu\" WHERE \"host\" = 'h1' ORDER BY \"ts\" DESC LIMIT 100"
    );
}

#[tokio::test]
async fn test_number_values_unquoted_strings_escaped() {
    let (app, _) = test_app();

    let (_, response) = post_json(
        app,
        "/api/v1/builder/sql",
        json!({"form": {
            "database": "metrics",
            "table": "cpu",
            "conditions": [
                {"field": "usage", "operator": ">=", "value": "0.75", "fieldType": "Number"},
                {"field": "host", "operator": "IN", "value": "a, b'c", "relation": "OR"}
            ]
        }}),
    )
    .await;

    assert_eq!(
        response["sql"],
        "SELECT * FROM \"metrics\".\"cpu\" WHERE \"usage\" >= 0.75 \
         OR \"host\" IN ('a','b''c') LIMIT 1000"
    );
}

#[tokio::test]
async fn test_invalid_form() {
    let (app, _) = test_app();

    let (status, response) = post_json(
        app.clone(),
        "/api/v1/builder/sql",
        json!({"form": {"table": "cpu", "limit": 0}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "validation_error");

    let (status, _) = post_json(
        app,
        "/api/v1/builder/sql",
        json!({"form": {"table": "cpu", "conditions": [{"field": "a", "operator": "~="}]}}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_extended_escape_policy() {
    let (app, _) = test_app();
    let form = |policy: &str| {
        json!({"form": {
            "table": "logs",
            "escapePolicy": policy,
            "conditions": [{"field": "msg", "operator": "LIKE", "value": "C:\\tmp\nit's"}]
        }})
    };

    let (status, response) = post_json(app.clone(), "/api/v1/builder/sql", form("extended")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response["sql"],
        "SELECT * FROM \"logs\" WHERE \"msg\" LIKE '%C:\\\\tmp\\nit''s%' LIMIT 1000"
    );

    let (_, response) = post_json(app.clone(), "/api/v1/builder/sql", form("quoteDoubling")).await;
    assert_eq!(
        response["sql"],
        "SELECT * FROM \"logs\" WHERE \"msg\" LIKE '%C:\\tmp\nit''s%' LIMIT 1000"
    );

    let (status, _) = post_json(app, "/api/v1/builder/sql", form("backslash")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
