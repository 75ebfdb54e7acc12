//! Liveness endpoint.
//!
//! Answers from local state only and never contacts the database.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use shared::time::{format_timezone_label, ClientContext};

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `"ok"` whenever the server answers.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Canonical timezone timestamps are presented in.
    pub timezone: String,
    /// Short label for that timezone as shown to a UTC client.
    pub timezone_label: String,
}

/// Creates the health routes.
pub fn health_routes(state: AppState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let timezone = state.timezone().to_string();
    // Labelled relative to UTC, as seen by a client that has no zone of its own.
    let context = ClientContext::utc(Utc::now());
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timezone_label: format_timezone_label(&timezone, &context),
        timezone,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state_in;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use shared::time::normalize_timezone;
    use tower::ServiceExt;

    async fn fetch(state: AppState) -> serde_json::Value {
        let response = health_routes(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_timezone() {
        let (state, backend) = test_state_in(normalize_timezone("asia/shanghai"));
        let health = fetch(state).await;

        assert_eq!(health["status"], "ok");
        assert_eq!(health["timezone"], "Asia/Shanghai");
        assert_eq!(health["timezoneLabel"], "Asia/Shanghai");
        assert!(health["version"].is_string());
        assert!(backend.executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_health_utc_label() {
        let (state, _) = test_state_in(normalize_timezone(""));
        let health = fetch(state).await;
        assert_eq!(health["timezone"], "UTC");
        assert_eq!(health["timezoneLabel"], "UTC");
    }
}
