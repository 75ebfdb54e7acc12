//! API route definitions.
//!
//! This module organizes all HTTP routes for the Tidelens API server.

mod builder;
mod health;
mod sql;
mod tables;
mod timezone;

pub use builder::builder_routes;
pub use health::health_routes;
pub use sql::sql_routes;
pub use tables::table_routes;
pub use timezone::timezone_routes;

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

/// Error response body shared by all endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Error type.
    pub error: String,
    /// Detailed error message.
    pub message: String,
}

impl ApiError {
    /// Creates an error body.
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
        }
    }
}

/// Rejection type returned by handlers.
pub type ApiRejection = (StatusCode, Json<ApiError>);
