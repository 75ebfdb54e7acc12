//! SQL pretty-printing.

use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// Normalizes the layout of `sql`, one statement per line, each terminated by
/// `;`.
///
/// Text that does not parse is returned trimmed with a single trailing `;`
/// and a warning is logged. Blank input yields an empty string.
///
/// # Examples
///
/// ```
/// use shared::sql::format_sql;
///
/// assert_eq!(format_sql("select  a from t"), "SELECT a FROM t;");
/// assert_eq!(format_sql("not valid sql"), "not valid sql;");
/// ```
#[must_use]
pub fn format_sql(sql: &str) -> String {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    match Parser::parse_sql(&GenericDialect {}, trimmed) {
        Ok(statements) if !statements.is_empty() => statements
            .iter()
            .map(|s| format!("{s};"))
            .collect::<Vec<_>>()
            .join("\n"),
        Ok(_) => String::new(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to format SQL, returning it unformatted");
            fallback(trimmed)
        }
    }
}

fn fallback(sql: &str) -> String {
    let body = sql.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    format!("{body};")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formats_multiple_statements() {
        assert_eq!(
            format_sql("select 1;\n\n  select  *  from cpu where host = 'a'"),
            "SELECT 1;\nSELECT * FROM cpu WHERE host = 'a';"
        );
    }

    #[test]
    fn test_fallback_keeps_single_semicolon() {
        assert_eq!(format_sql("SELEKT nope;;"), "SELEKT nope;");
        assert_eq!(format_sql("  garbage here "), "garbage here;");
    }

    #[test]
    fn test_blank_input() {
        assert_eq!(format_sql(""), "");
        assert_eq!(format_sql("   "), "");
    }
}
