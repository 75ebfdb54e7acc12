//! String escaping for values interpolated into SQL literals.
//!
//! Two policies exist side by side. The query builder only doubles single
//! quotes, while the log search panel also escapes backslashes and line
//! breaks. They are kept as separate, named policies so callers choose
//! explicitly.

use serde::{Deserialize, Serialize};

/// Escaping policy applied to values placed inside single-quoted literals.
///
/// Serialized as `"quoteDoubling"` / `"extended"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EscapePolicy {
    /// Only `'` is escaped, by doubling it.
    #[default]
    QuoteDoubling,
    /// `\`, `'`, newline and carriage return are escaped.
    Extended,
}

impl EscapePolicy {
    /// Escapes `value` according to this policy.
    #[must_use]
    pub fn escape(self, value: &str) -> String {
        match self {
            Self::QuoteDoubling => escape_sql_string(value),
            Self::Extended => escape_sql_string_extended(value),
        }
    }
}

/// Doubles every single quote in `value`.
///
/// # Examples
///
/// ```
/// use shared::sql::escape_sql_string;
///
/// assert_eq!(escape_sql_string("it's"), "it''s");
/// ```
#[must_use]
pub fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// Escapes backslashes, single quotes, newlines and carriage returns.
///
/// Backslashes are escaped first so the sequences introduced for line breaks
/// are not escaped twice.
#[must_use]
pub fn escape_sql_string_extended(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("''"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            other => escaped.push(other),
        }
    }
    escaped
}
