//! Splitting a SQL document into statements.
//!
//! A single linear scan tracks whether the cursor is inside a quoted string
//! or a comment, so semicolons in those positions do not end a statement.
//! An odd run of backslashes escapes the quote that follows it.

use serde::{Deserialize, Serialize};

/// A statement within a larger SQL text.
///
/// Offsets are byte offsets into the source. `end` is inclusive: it points at
/// the terminating `;`, or at the last byte of an unterminated trailing
/// statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlStatement {
    /// Trimmed statement text, including its `;` when present.
    pub text: String,
    /// Offset where the statement's region starts.
    pub start: usize,
    /// Inclusive offset where the statement's region ends.
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Code,
    String(u8),
    LineComment,
    BlockComment,
}

/// Splits `sql` into statements.
///
/// # Examples
///
/// ```
/// use shared::sql::parse_sql_statements;
///
/// let statements = parse_sql_statements("SELECT ';'; -- a;\nSELECT 2;");
/// assert_eq!(statements.len(), 2);
/// assert_eq!(statements[0].text, "SELECT ';';");
/// ```
#[must_use]
pub fn parse_sql_statements(sql: &str) -> Vec<SqlStatement> {
    let bytes = sql.as_bytes();
    let mut statements = Vec::new();
    let mut state = ScanState::Code;
    let mut start = 0;
    let mut escaped = false;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            ScanState::Code => match c {
                b'-' if next == Some(b'-') => {
                    state = ScanState::LineComment;
                    i += 1;
                }
                b'/' if next == Some(b'*') => {
                    state = ScanState::BlockComment;
                    i += 1;
                }
                b'\'' | b'"' if !escaped => state = ScanState::String(c),
                b';' => {
                    let text = sql[start..=i].trim();
                    if !text.is_empty() {
                        statements.push(SqlStatement {
                            text: text.to_string(),
                            start,
                            end: i,
                        });
                    }
                    start = i + 1;
                }
                _ => {}
            },
            ScanState::String(quote) => {
                if c == quote && !escaped {
                    state = ScanState::Code;
                }
            }
            ScanState::LineComment => {
                if c == b'\n' || c == b'\r' {
                    state = ScanState::Code;
                }
            }
            ScanState::BlockComment => {
                if c == b'*' && next == Some(b'/') {
                    state = ScanState::Code;
                    i += 1;
                }
            }
        }
        escaped = c == b'\\' && !escaped;
        i += 1;
    }

    if start < bytes.len() {
        let text = sql[start..].trim();
        if !text.is_empty() {
            statements.push(SqlStatement {
                text: text.to_string(),
                start,
                end: bytes.len() - 1,
            });
        }
    }

    statements
}

/// Finds the statement under the cursor.
///
/// A cursor sitting right after a statement's `;` selects that statement even
/// when the next statement's region also covers the position. Otherwise the
/// first statement whose `[start, end]` contains `position` wins.
#[must_use]
pub fn find_statement_at_position(
    statements: &[SqlStatement],
    position: usize,
) -> Option<(usize, &SqlStatement)> {
    statements
        .iter()
        .enumerate()
        .find(|(_, s)| s.end + 1 == position)
        .or_else(|| {
            statements
                .iter()
                .enumerate()
                .find(|(_, s)| s.start <= position && position <= s.end)
        })
}

/// Extracts the table name following `FROM` in a query, without database
/// qualifier or quotes.
#[must_use]
pub fn parse_table(sql: &str) -> Option<String> {
    let mut tokens = sql.split_whitespace();
    tokens.find(|t| t.eq_ignore_ascii_case("from"))?;
    let reference = tokens.next()?.trim_end_matches([';', ')', ',']);
    let table = reference.rsplit('.').next()?.trim_matches(['"', '`']);
    (!table.is_empty()).then(|| table.to_string())
}
