//! Filter conditions and their compilation into SQL fragments.

use super::escape::EscapePolicy;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Filter operators offered by the query builder and the log search panel.
///
/// Serialized with the spelling shown in the UI (`"NOT LIKE"`, `"Exist"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// Equal (=)
    #[serde(rename = "=")]
    Eq,
    /// Not equal (!=)
    #[serde(rename = "!=")]
    NotEq,
    /// Greater than (>)
    #[serde(rename = ">")]
    Gt,
    /// Greater than or equal (>=)
    #[serde(rename = ">=")]
    GtEq,
    /// Less than (<)
    #[serde(rename = "<")]
    Lt,
    /// Less than or equal (<=)
    #[serde(rename = "<=")]
    LtEq,
    /// Substring match, value wrapped in `%...%`
    #[serde(rename = "LIKE")]
    Like,
    /// Negated substring match
    #[serde(rename = "NOT LIKE")]
    NotLike,
    /// Membership in a comma-separated list
    #[serde(rename = "IN")]
    In,
    /// Negated membership
    #[serde(rename = "NOT IN")]
    NotIn,
    /// Field is not null
    #[serde(rename = "Exist")]
    Exist,
    /// Field is null
    #[serde(rename = "Not Exist")]
    NotExist,
    /// Full-text term match
    #[serde(rename = "contains")]
    Contains,
    /// Negated full-text term match
    #[serde(rename = "not contains")]
    NotContains,
    /// Full-text match with the value passed through verbatim
    #[serde(rename = "match sequence")]
    MatchSequence,
}

impl Operator {
    /// All operators, in the order the builder lists them.
    pub const ALL: [Operator; 15] = [
        Self::Eq,
        Self::NotEq,
        Self::Gt,
        Self::GtEq,
        Self::Lt,
        Self::LtEq,
        Self::Like,
        Self::NotLike,
        Self::In,
        Self::NotIn,
        Self::Exist,
        Self::NotExist,
        Self::Contains,
        Self::NotContains,
        Self::MatchSequence,
    ];

    /// The spelling used in the UI and on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Exist => "Exist",
            Self::NotExist => "Not Exist",
            Self::Contains => "contains",
            Self::NotContains => "not contains",
            Self::MatchSequence => "match sequence",
        }
    }

    /// Returns true for operators that take no value.
    #[must_use]
    pub fn is_unary(self) -> bool {
        matches!(self, Self::Exist | Self::NotExist)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an operator string is not recognized.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown operator: '{0}'")]
pub struct UnknownOperator(pub String);

impl FromStr for Operator {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownOperator(s.to_string()))
    }
}

/// Logical relation joining a condition to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Relation {
    /// Logical AND
    #[default]
    And,
    /// Logical OR
    Or,
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// Column type family, deciding how a value is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// Numeric column, rendered unquoted.
    Number,
    /// Timestamp column, rendered unquoted.
    Time,
    /// Boolean column.
    Boolean,
    /// Text column, rendered as a quoted literal.
    String,
}

impl FieldType {
    /// Maps a database data type name (`Int64`, `TimestampMillisecond`,
    /// `Boolean`, `String`, ...) to its type family.
    #[must_use]
    pub fn from_data_type(data_type: &str) -> Self {
        let lower = data_type.to_ascii_lowercase();
        if lower.contains("timestamp") || lower == "date" || lower == "datetime" {
            Self::Time
        } else if lower.starts_with("int")
            || lower.starts_with("uint")
            || lower.starts_with("float")
            || lower.starts_with("decimal")
            || lower == "double"
        {
            Self::Number
        } else if lower == "boolean" || lower == "bool" {
            Self::Boolean
        } else {
            Self::String
        }
    }
}

/// A value entered for a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
}

impl ConditionValue {
    /// Returns true for an empty string value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::String(s) if s.is_empty())
    }
}

impl std::fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(fl) => f.write_str(&format_number(*fl)),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ConditionValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for ConditionValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// A single filter condition of the query builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Column name; always emitted double-quoted.
    pub field: String,
    /// The filter operator.
    pub operator: Operator,
    /// The value; ignored by `Exist` / `Not Exist`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ConditionValue>,
    /// Relation to the previous condition.
    #[serde(default)]
    pub relation: Relation,
    /// Type family of the column, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
}

impl Condition {
    /// Creates an `AND` condition without a field type.
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<ConditionValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: Some(value.into()),
            relation: Relation::And,
            field_type: None,
        }
    }

    /// Creates an `Exist` / `Not Exist` style condition with no value.
    #[must_use]
    pub fn unary(field: impl Into<String>, operator: Operator) -> Self {
        Self {
            field: field.into(),
            operator,
            value: None,
            relation: Relation::And,
            field_type: None,
        }
    }

    /// Sets the field type.
    #[must_use]
    pub fn with_field_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    /// Sets the relation to the previous condition.
    #[must_use]
    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relation = relation;
        self
    }

    /// Returns true if the condition has everything it needs to compile.
    ///
    /// A field is always required; a non-empty value is required unless the
    /// operator is `Exist` / `Not Exist`.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        if self.field.is_empty() {
            return false;
        }
        if self.operator.is_unary() {
            return true;
        }
        self.value.as_ref().is_some_and(|v| !v.is_empty())
    }

    /// Compiles the condition with the default quote-doubling policy.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared::sql::{Condition, FieldType, Operator};
    ///
    /// let c = Condition::new("host", Operator::Eq, "h1").with_field_type(FieldType::String);
    /// assert_eq!(c.compile(), "\"host\" = 'h1'");
    ///
    /// let c = Condition::new("cpu", Operator::Gt, "0.5").with_field_type(FieldType::Number);
    /// assert_eq!(c.compile(), "\"cpu\" > 0.5");
    /// ```
    #[must_use]
    pub fn compile(&self) -> String {
        self.compile_with(EscapePolicy::QuoteDoubling)
    }

    /// Compiles the condition using the given escaping policy.
    #[must_use]
    pub fn compile_with(&self, policy: EscapePolicy) -> String {
        let field = format!("\"{}\"", self.field);
        let raw = self
            .value
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();

        match self.operator {
            Operator::Exist => format!("{field} IS NOT NULL"),
            Operator::NotExist => format!("{field} IS NULL"),
            Operator::Like | Operator::NotLike => {
                format!("{field} {} '%{}%'", self.operator, policy.escape(&raw))
            }
            Operator::In | Operator::NotIn => {
                let list = raw
                    .split(',')
                    .map(|part| {
                        let item = ConditionValue::String(part.trim().to_string());
                        format_literal(&item, self.field_type, policy)
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{field} {} ({list})", self.operator)
            }
            Operator::Contains => format!("MATCHES({field}, '\"{}\"')", policy.escape(&raw)),
            Operator::NotContains => format!("MATCHES({field}, '-\"{}\"')", policy.escape(&raw)),
            Operator::MatchSequence => format!("MATCHES({field}, '{}')", policy.escape(&raw)),
            Operator::Eq
            | Operator::NotEq
            | Operator::Gt
            | Operator::GtEq
            | Operator::Lt
            | Operator::LtEq => {
                let value = self
                    .value
                    .clone()
                    .unwrap_or(ConditionValue::String(String::new()));
                format!(
                    "{field} {} {}",
                    self.operator,
                    format_literal(&value, self.field_type, policy)
                )
            }
        }
    }
}

/// Compiles the complete conditions of `conditions` into WHERE-clause parts.
///
/// Incomplete conditions are skipped. Every part after the first is prefixed
/// with its relation; the first condition's relation is dropped.
#[must_use]
pub fn compile_conditions(conditions: &[Condition], policy: EscapePolicy) -> Vec<String> {
    conditions
        .iter()
        .filter(|c| c.is_complete())
        .enumerate()
        .map(|(index, condition)| {
            let compiled = condition.compile_with(policy);
            if index == 0 {
                compiled
            } else {
                format!("{} {compiled}", condition.relation)
            }
        })
        .collect()
}

/// Renders `value` as a SQL literal for a column of `field_type`.
fn format_literal(
    value: &ConditionValue,
    field_type: Option<FieldType>,
    policy: EscapePolicy,
) -> String {
    match field_type {
        Some(FieldType::Number | FieldType::Time) => numeric_literal(value),
        Some(FieldType::Boolean) => boolean_literal(value).to_string(),
        Some(FieldType::String) | None => format!("'{}'", policy.escape(&value.to_string())),
    }
}

/// Coerces a value to a number the way the dashboard does: blank text is
/// zero and unparseable text becomes `NaN`.
fn numeric_literal(value: &ConditionValue) -> String {
    match value {
        ConditionValue::Integer(i) => i.to_string(),
        ConditionValue::Float(f) => format_number(*f),
        ConditionValue::Boolean(b) => u8::from(*b).to_string(),
        ConditionValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return "0".to_string();
            }
            trimmed
                .parse::<f64>()
                .map_or_else(|_| "NaN".to_string(), format_number)
        }
    }
}

fn boolean_literal(value: &ConditionValue) -> bool {
    match value {
        ConditionValue::Boolean(b) => *b,
        ConditionValue::Integer(i) => *i != 0,
        ConditionValue::Float(f) => *f != 0.0 && !f.is_nan(),
        ConditionValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.eq_ignore_ascii_case("false") {
                false
            } else {
                trimmed.eq_ignore_ascii_case("true") || !trimmed.is_empty()
            }
        }
    }
}

/// Formats a float the way JavaScript's `String(number)` does.
///
/// Integral values have no fraction. Magnitudes of `1e21` and above, or
/// below `1e-6`, use exponent form with an explicit sign: `1e+21`, `1.5e-7`.
pub(crate) fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return format!("{value}");
    }
    let formatted = format!("{value:e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => formatted,
    }
}
