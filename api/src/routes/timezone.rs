//! Timezone normalization endpoint.

use crate::state::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use shared::time::{db_timezone, format_timezone_label, normalize_timezone_str};

/// Request body for timezone normalization.
#[derive(Debug, Deserialize)]
pub struct TimezoneRequest {
    /// Timezone as entered by the user.
    pub timezone: String,
}

/// Normalized timezone.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimezoneResponse {
    /// Canonical form.
    pub timezone: String,
    /// Label shown next to timestamps; empty when redundant for the server's zone.
    pub label: String,
    /// Value sent to the database as the session timezone.
    pub db_timezone: String,
}

/// Creates the timezone routes with application state.
pub fn timezone_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/timezone", post(normalize))
        .with_state(state)
}

/// Never fails: unknown input normalizes to `UTC`.
async fn normalize(
    State(state): State<AppState>,
    Json(request): Json<TimezoneRequest>,
) -> Json<TimezoneResponse> {
    let context = state.client_context();
    Json(TimezoneResponse {
        timezone: normalize_timezone_str(&request.timezone),
        label: format_timezone_label(&request.timezone, &context),
        db_timezone: db_timezone(&request.timezone, &context),
    })
}
