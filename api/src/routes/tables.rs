//! Table browser endpoints.
//!
//! Lists the tables of the configured database and describes one of them,
//! including the timestamp column the query builder should filter on.

use super::sql::backend_error;
use super::ApiRejection;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::sql::{TableColumn, TsColumn};

/// Table names.
#[derive(Debug, Serialize, Deserialize)]
pub struct TablesResponse {
    /// Names as reported by `SHOW TABLES`.
    pub tables: Vec<String>,
}

/// Columns of one table.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescription {
    /// Table name.
    pub table: String,
    /// Columns as reported by `DESC TABLE`.
    pub columns: Vec<TableColumn>,
    /// Timestamp column for the time window, when the table has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts_column: Option<TsColumn>,
}

/// Creates the table browser routes.
pub fn table_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/tables", get(list_tables))
        .route("/api/v1/tables/{table}", get(describe_table))
        .with_state(state)
}

async fn list_tables(State(state): State<AppState>) -> Result<Json<TablesResponse>, ApiRejection> {
    let tables = state.backend().list_tables().await.map_err(backend_error)?;
    Ok(Json(TablesResponse { tables }))
}

async fn describe_table(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<TableDescription>, ApiRejection> {
    let columns = state
        .backend()
        .describe_table(&table)
        .await
        .map_err(backend_error)?;
    let ts_column = TsColumn::detect(&columns);
    tracing::debug!(
        table = %table,
        columns = columns.len(),
        ts_column = ?ts_column.as_ref().map(|c| &c.name),
        "Described table"
    );
    Ok(Json(TableDescription {
        table,
        columns,
        ts_column,
    }))
}
