//! SQL generation, splitting and formatting.
//!
//! - [`condition`]: filter conditions compiled into WHERE-clause fragments
//! - [`builder`]: SELECT statements assembled from the query builder form
//! - [`splitter`]: statement boundaries in a multi-statement document
//! - [`format`]: layout normalization through `sqlparser`

pub mod builder;
pub mod condition;
pub mod escape;
pub mod format;
pub mod splitter;

pub use builder::{
    build_sql, build_template, generate_sql, BuilderFormState, Fragment, SortOrder, SqlTemplate,
    TableColumn, TsColumn, DEFAULT_LIMIT,
};
pub use condition::{
    compile_conditions, Condition, ConditionValue, FieldType, Operator, Relation, UnknownOperator,
};
pub use escape::{escape_sql_string, escape_sql_string_extended, EscapePolicy};
pub use format::format_sql;
pub use splitter::{find_statement_at_position, parse_sql_statements, parse_table, SqlStatement};
