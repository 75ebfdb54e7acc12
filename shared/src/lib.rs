//! Tidelens Shared Library
//!
//! Query workbench core used by the Tidelens service and CLI.
//!
//! # Modules
//!
//! - [`sql`] - Condition compiler, SELECT builder, statement splitter and formatter
//! - [`time`] - Time windows, placeholder substitution and timezone normalization
//! - [`url_state`] - Shareable query state encoded in a URL query string
//! - [`settings`] - Connection settings and persisted client state
//! - [`client`] - HTTP client for the database REST API
//!
//! # Example
//!
//! ```
//! use shared::sql::{generate_sql, BuilderFormState, Condition, FieldType, Operator, TsColumn};
//! use shared::time::{replace_time_placeholders, TimeRange};
//!
//! let form = BuilderFormState::new("cpu")
//!     .with_condition(
//!         Condition::new("usage", Operator::Gt, "0.9").with_field_type(FieldType::Number),
//!     )
//!     .with_ts_column(TsColumn::new("ts"));
//! let window = TimeRange::relative(5).values();
//!
//! let sql = generate_sql(&form, &window);
//! assert_eq!(
//!     sql,
//!     "SELECT * FROM \"cpu\" WHERE \"usage\" > 0.9 \
//!      AND ts <= $timeend AND ts >= $timestart LIMIT 1000"
//! );
//! assert!(replace_time_placeholders(&sql, &window).contains("now() - Interval '5m'"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod settings;
pub mod sql;
pub mod time;
pub mod url_state;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use validator;
