//! Integration tests for the Tidelens API.
//!
//! These tests drive the full router, with every layer applied, against a
//! fake database backend.

mod integration_tests {
    mod builder_tests;
    mod common;
    mod health_tests;
    mod sql_tests;
    mod tables_tests;
    mod timezone_tests;
}
