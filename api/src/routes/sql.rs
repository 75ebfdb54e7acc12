//! SQL editor endpoints.
//!
//! Splitting and formatting are local; `run` and `databases` go to the
//! database through the configured backend. `run` answers with JSON, or with
//! the first result set as CSV when asked for `"format": "csv"`.

use super::{ApiError, ApiRejection};
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::client::{ClientError, SqlResponse};
use shared::sql::{
    find_statement_at_position, format_sql, parse_sql_statements, parse_table, SqlStatement,
};
use shared::time::{replace_time_placeholders, TimeRange, TimeWindow};

/// Request body for statement splitting.
#[derive(Debug, Deserialize)]
pub struct SplitRequest {
    /// SQL document.
    pub sql: String,
    /// Cursor byte offset, to pick the active statement.
    #[serde(default)]
    pub cursor: Option<usize>,
}

/// The statement under the cursor.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveStatement {
    /// Position in `statements`.
    pub index: usize,
    /// The statement.
    pub statement: SqlStatement,
    /// Table the statement reads from, when it has a `FROM` clause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

/// Statements of a document.
#[derive(Debug, Serialize, Deserialize)]
pub struct SplitResponse {
    /// Statements in document order.
    pub statements: Vec<SqlStatement>,
    /// Statement under the cursor, if a cursor was given and one matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<ActiveStatement>,
}

/// Request and response body for formatting.
#[derive(Debug, Serialize, Deserialize)]
pub struct FormatBody {
    /// SQL text.
    pub sql: String,
}

/// Response encoding of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// [`RunResponse`] as JSON.
    #[default]
    Json,
    /// The first result set as `text/csv`.
    Csv,
}

/// Request body for execution.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// SQL, possibly with `$timestart` / `$timeend`.
    pub sql: String,
    /// Time range for the placeholders; missing bounds use the defaults.
    #[serde(default)]
    pub time_range: TimeRange,
    /// Response encoding.
    #[serde(default)]
    pub format: OutputFormat,
}

/// Result of an execution.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    /// The SQL actually sent.
    pub sql: String,
    /// The database response.
    pub result: SqlResponse,
}

/// Database names.
#[derive(Debug, Serialize, Deserialize)]
pub struct DatabasesResponse {
    /// Names as reported by the database.
    pub databases: Vec<String>,
}

/// Creates the SQL routes with application state.
pub fn sql_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/sql/split", post(split_sql))
        .route("/api/v1/sql/format", post(format_sql_handler))
        .route("/api/v1/sql/run", post(run_sql))
        .route("/api/v1/databases", get(list_databases))
        .with_state(state)
}

async fn split_sql(Json(request): Json<SplitRequest>) -> Json<SplitResponse> {
    let statements = parse_sql_statements(&request.sql);
    let active = request.cursor.and_then(|cursor| {
        find_statement_at_position(&statements, cursor).map(|(index, statement)| ActiveStatement {
            index,
            table: parse_table(&statement.text),
            statement: statement.clone(),
        })
    });
    tracing::debug!(count = statements.len(), "Split SQL document");
    Json(SplitResponse { statements, active })
}

async fn format_sql_handler(Json(request): Json<FormatBody>) -> Json<FormatBody> {
    Json(FormatBody {
        sql: format_sql(&request.sql),
    })
}

async fn run_sql(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Response, ApiRejection> {
    if request.sql.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("invalid_request", "sql must not be empty")),
        ));
    }

    let window: TimeWindow = request.time_range.values();
    let sql = replace_time_placeholders(&request.sql, &window);

    if request.format == OutputFormat::Csv {
        let csv = state.backend().run_sql_csv(&sql).await.map_err(backend_error)?;
        tracing::debug!(bytes = csv.len(), "SQL executed as CSV");
        let headers = [(header::CONTENT_TYPE, "text/csv; charset=utf-8")];
        return Ok((headers, csv).into_response());
    }

    let result = state.backend().run_sql(&sql).await.map_err(backend_error)?;
    tracing::debug!(
        outputs = result.output.len(),
        execution_time_ms = ?result.execution_time_ms,
        "SQL executed"
    );
    Ok(Json(RunResponse { sql, result }).into_response())
}

async fn list_databases(
    State(state): State<AppState>,
) -> Result<Json<DatabasesResponse>, ApiRejection> {
    let databases = state.backend().list_databases().await.map_err(backend_error)?;
    Ok(Json(DatabasesResponse { databases }))
}

pub(super) fn backend_error(e: ClientError) -> ApiRejection {
    tracing::error!(error = %e, "Database request failed");
    (
        StatusCode::BAD_GATEWAY,
        Json(ApiError::new("backend_error", e.to_string())),
    )
}
