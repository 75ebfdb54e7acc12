//! Query builder endpoint.
//!
//! Turns a builder form and an optional time range into SQL.

use super::{ApiError, ApiRejection};
use axum::{http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use shared::sql::{build_template, BuilderFormState};
use shared::time::TimeRange;
use shared::validator::Validate;

/// Request body for SQL generation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    /// The builder form.
    pub form: BuilderFormState,
    /// Time range to apply; no range means no time condition.
    #[serde(default)]
    pub time_range: TimeRange,
}

/// Generated SQL.
#[derive(Debug, Serialize, Deserialize)]
pub struct BuildResponse {
    /// SQL with the time window substituted.
    pub sql: String,
    /// SQL with `$timestart` / `$timeend` placeholders.
    pub template: String,
}

/// Creates the builder routes.
pub fn builder_routes() -> Router {
    Router::new().route("/api/v1/builder/sql", post(build_sql))
}

/// Handler for SQL generation. An empty table yields empty SQL.
async fn build_sql(Json(request): Json<BuildRequest>) -> Result<Json<BuildResponse>, ApiRejection> {
    request.form.validate().map_err(|e| {
        tracing::debug!(error = %e, "Invalid builder form");
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("validation_error", e.to_string())),
        )
    })?;

    let window = request.time_range.values();
    let response = match build_template(&request.form, &window) {
        Some(template) => BuildResponse {
            sql: template.render(&window),
            template: template.to_placeholder_sql(),
        },
        None => BuildResponse {
            sql: String::new(),
            template: String::new(),
        },
    };

    tracing::debug!(table = %request.form.table, sql = %response.sql, "Generated SQL");
    Ok(Json(response))
}
