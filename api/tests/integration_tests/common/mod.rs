//! Common test utilities and helpers for integration tests.
//!
//! This module provides shared functionality used across all integration tests,
//! including test app setup, a fake database backend and HTTP request helpers.

use api::{create_router, AppState};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use shared::client::{
    ClientError, ColumnSchema, Records, Schema, SqlBackend, SqlOutput, SqlResponse,
};
use shared::time::Timezone;
use std::sync::{Arc, Mutex};

/// Backend that records every statement and echoes it back as a single row
/// of a `sql` column.
///
/// Statements containing `broken` fail with a database error. `SHOW TABLES`
/// and `DESC TABLE "logs"` describe a single `logs` table.
#[derive(Default)]
pub struct RecordingBackend {
    executed: Mutex<Vec<String>>,
}

impl RecordingBackend {
    /// Statements executed so far.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlBackend for RecordingBackend {
    async fn run_sql(&self, sql: &str) -> Result<SqlResponse, ClientError> {
        self.executed.lock().unwrap().push(sql.to_string());
        if sql.contains("broken") {
            return Err(ClientError::Database {
                code: 1001,
                message: "Table not found".to_string(),
            });
        }
        let (columns, rows): (Vec<&str>, Vec<Vec<Value>>) = match sql {
            "SHOW DATABASES" => (
                vec!["Database"],
                vec![vec!["greptime_private".into()], vec!["public".into()]],
            ),
            "SHOW TABLES" => (vec!["Tables"], vec![vec!["logs".into()]]),
            "DESC TABLE \"logs\"" => (
                vec!["Column", "Type", "Key", "Null", "Default", "Semantic Type"],
                vec![
                    vec![
                        "created".into(),
                        "TimestampSecond".into(),
                        "".into(),
                        "YES".into(),
                        Value::Null,
                        "FIELD".into(),
                    ],
                    vec![
                        "greptime_timestamp".into(),
                        "TimestampNanosecond".into(),
                        "PRI".into(),
                        "NO".into(),
                        "".into(),
                        "TIMESTAMP".into(),
                    ],
                ],
            ),
            _ => (vec!["sql"], vec![vec![sql.into()]]),
        };
        let column_schemas = columns
            .iter()
            .map(|name| ColumnSchema {
                name: (*name).to_string(),
                data_type: "String".to_string(),
            })
            .collect();
        Ok(SqlResponse {
            output: vec![SqlOutput {
                records: Some(Records {
                    schema: Schema { column_schemas },
                    rows,
                    total_rows: None,
                }),
                affectedrows: None,
            }],
            execution_time_ms: Some(1),
            ..SqlResponse::default()
        })
    }
}

/// Creates a test router over a fresh recording backend in `timezone`.
pub fn test_app_in(timezone: Timezone) -> (Router, Arc<RecordingBackend>) {
    let backend = Arc::new(RecordingBackend::default());
    let state = AppState::new(backend.clone(), timezone);
    (create_router(state), backend)
}

/// Creates a test router over a fresh recording backend in UTC.
///
/// # Returns
///
/// A tuple containing the configured router and the backend.
pub fn test_app() -> (Router, Arc<RecordingBackend>) {
    test_app_in(Timezone::Utc)
}

/// Helper to make a POST request with JSON body.
///
/// # Returns
///
/// A tuple containing the response status code and parsed JSON response body.
pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Helper to make a GET request.
pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Helper to make a POST request with JSON body and read the raw response.
///
/// # Returns
///
/// A tuple containing the status code, the content type and the body text.
pub async fn post_json_text(app: Router, uri: &str, body: Value) -> (StatusCode, String, String) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, String::from_utf8(body_bytes.to_vec()).unwrap())
}
