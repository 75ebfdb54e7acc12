//! SQL assembly for the visual query builder.
//!
//! The builder produces a [`SqlTemplate`]: SQL text interleaved with typed
//! references to the start and end of the time window. The template can be
//! shown with `$timestart` / `$timeend` placeholders or rendered against a
//! concrete [`TimeWindow`] without any textual search and replace.

use super::condition::{compile_conditions, Condition, ConditionValue, Operator};
use super::escape::EscapePolicy;
use crate::time::{TimeWindow, TIME_END_PLACEHOLDER, TIME_START_PLACEHOLDER};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Row limit used when the form does not set one.
pub const DEFAULT_LIMIT: u32 = 1000;

/// Sort direction of the ORDER BY clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    #[default]
    Desc,
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asc => write!(f, "ASC"),
            Self::Desc => write!(f, "DESC"),
        }
    }
}

/// The timestamp column the time window applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TsColumn {
    /// Column name, emitted unquoted in the time condition.
    pub name: String,
    /// Column data type as reported by the database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

impl TsColumn {
    /// Creates a timestamp column reference without a data type.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: None,
        }
    }

    /// Picks the timestamp column of a table.
    ///
    /// Only columns whose data type mentions `timestamp` qualify. The time
    /// index column wins; otherwise the first candidate is used.
    #[must_use]
    pub fn detect(columns: &[TableColumn]) -> Option<Self> {
        let candidates: Vec<&TableColumn> = columns
            .iter()
            .filter(|c| c.data_type.to_ascii_lowercase().contains("timestamp"))
            .collect();
        let chosen = candidates
            .iter()
            .find(|c| c.is_time_index())
            .or_else(|| candidates.first())?;
        Some(Self {
            name: chosen.name.clone(),
            data_type: Some(chosen.data_type.clone()),
        })
    }
}

/// A column as listed by `DESC TABLE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumn {
    /// Column name.
    pub name: String,
    /// Database data type, e.g. `TimestampMillisecond`.
    pub data_type: String,
    /// Semantic type: `TAG`, `FIELD` or `TIMESTAMP`.
    #[serde(default)]
    pub semantic_type: String,
}

impl TableColumn {
    /// Creates a column description.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        data_type: impl Into<String>,
        semantic_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            semantic_type: semantic_type.into(),
        }
    }

    /// Returns true for the table's time index. `TIME INDEX` is the key
    /// older servers report for it.
    #[must_use]
    pub fn is_time_index(&self) -> bool {
        let semantic = self.semantic_type.trim();
        semantic.eq_ignore_ascii_case("TIMESTAMP") || semantic.eq_ignore_ascii_case("TIME INDEX")
    }
}

/// State of the query builder form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BuilderFormState {
    /// Database qualifying the table, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Table to select from; empty means "nothing to build".
    #[serde(default)]
    pub table: String,
    /// Filter conditions in display order.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Column to order by; empty disables ORDER BY.
    #[serde(default)]
    pub order_by_field: String,
    /// Sort direction.
    #[serde(default)]
    pub order_by: SortOrder,
    /// Maximum number of rows.
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, message = "limit must be at least 1"))]
    pub limit: u32,
    /// Timestamp column for the time window.
    #[serde(default)]
    pub ts_column: Option<TsColumn>,
    /// How string literals in conditions are escaped.
    #[serde(default)]
    pub escape_policy: EscapePolicy,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

impl Default for BuilderFormState {
    fn default() -> Self {
        Self {
            database: None,
            table: String::new(),
            conditions: Vec::new(),
            order_by_field: String::new(),
            order_by: SortOrder::Desc,
            limit: DEFAULT_LIMIT,
            ts_column: None,
            escape_policy: EscapePolicy::QuoteDoubling,
        }
    }
}

impl BuilderFormState {
    /// Creates an empty form for `table`.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Sets the qualifying database.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Adds a condition.
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Sets the ORDER BY field and direction.
    #[must_use]
    pub fn with_order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.order_by_field = field.into();
        self.order_by = order;
        self
    }

    /// Sets the row limit.
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the timestamp column.
    #[must_use]
    pub fn with_ts_column(mut self, column: TsColumn) -> Self {
        self.ts_column = Some(column);
        self
    }

    /// Sets how string literals are escaped.
    #[must_use]
    pub fn with_escape_policy(mut self, policy: EscapePolicy) -> Self {
        self.escape_policy = policy;
        self
    }

    /// Appends an `AND` condition, as done when a user filters on a cell of
    /// the result table.
    pub fn add_filter_condition(
        &mut self,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<ConditionValue>,
    ) {
        self.conditions.push(Condition::new(column, operator, value));
    }

    /// The quoted table reference, qualified by the database when set.
    #[must_use]
    pub fn table_reference(&self) -> String {
        match self.database.as_deref().filter(|db| !db.is_empty()) {
            Some(db) => format!("\"{db}\".\"{}\"", self.table),
            None => format!("\"{}\"", self.table),
        }
    }
}

/// One piece of a [`SqlTemplate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Literal SQL text.
    Text(String),
    /// Start of the time window.
    TimeStart,
    /// End of the time window.
    TimeEnd,
}

/// SQL text with typed time window references.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SqlTemplate {
    fragments: Vec<Fragment>,
}

impl SqlTemplate {
    /// Creates an empty template.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends literal text, merging with a preceding text fragment.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Fragment::Text(last)) = self.fragments.last_mut() {
            last.push_str(text);
        } else {
            self.fragments.push(Fragment::Text(text.to_string()));
        }
    }

    /// Appends a time window reference.
    pub fn push(&mut self, fragment: Fragment) {
        match fragment {
            Fragment::Text(text) => self.push_text(&text),
            other => self.fragments.push(other),
        }
    }

    /// The fragments in order.
    #[must_use]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Returns true if the template references the time window.
    #[must_use]
    pub fn has_time_window(&self) -> bool {
        self.fragments
            .iter()
            .any(|f| matches!(f, Fragment::TimeStart | Fragment::TimeEnd))
    }

    /// Renders with `$timestart` / `$timeend` placeholders.
    #[must_use]
    pub fn to_placeholder_sql(&self) -> String {
        self.to_string()
    }

    /// Renders against a concrete window. Missing bounds fall back to the
    /// default relative window.
    #[must_use]
    pub fn render(&self, window: &TimeWindow) -> String {
        let mut sql = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Text(text) => sql.push_str(text),
                Fragment::TimeStart => sql.push_str(&window.start_or_default()),
                Fragment::TimeEnd => sql.push_str(&window.end_or_default()),
            }
        }
        sql
    }
}

impl std::fmt::Display for SqlTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for fragment in &self.fragments {
            match fragment {
                Fragment::Text(text) => f.write_str(text)?,
                Fragment::TimeStart => f.write_str(TIME_START_PLACEHOLDER)?,
                Fragment::TimeEnd => f.write_str(TIME_END_PLACEHOLDER)?,
            }
        }
        Ok(())
    }
}

/// Builds the SELECT template for `form`, or `None` when no table is set.
///
/// The time condition only appears when the form has a timestamp column and
/// `window` has at least one bound.
#[must_use]
pub fn build_template(form: &BuilderFormState, window: &TimeWindow) -> Option<SqlTemplate> {
    if form.table.is_empty() {
        return None;
    }

    let mut template = SqlTemplate::new();
    template.push_text(&format!("SELECT * FROM {}", form.table_reference()));

    let conditions = compile_conditions(&form.conditions, form.escape_policy);
    let time_column = form
        .ts_column
        .as_ref()
        .filter(|c| !c.name.is_empty() && !window.is_empty());

    if !conditions.is_empty() || time_column.is_some() {
        template.push_text(" WHERE ");
        template.push_text(&conditions.join(" "));
    }

    if let Some(column) = time_column {
        if !conditions.is_empty() {
            template.push_text(" AND ");
        }
        let name = &column.name;
        match (&window.start, &window.end) {
            (Some(_), None) => {
                template.push_text(&format!("{name} > "));
                template.push(Fragment::TimeStart);
            }
            (None, Some(_)) => {
                template.push_text(&format!("{name} < "));
                template.push(Fragment::TimeEnd);
            }
            (Some(_), Some(_)) => {
                template.push_text(&format!("{name} <= "));
                template.push(Fragment::TimeEnd);
                template.push_text(&format!(" AND {name} >= "));
                template.push(Fragment::TimeStart);
            }
            (None, None) => {}
        }
    }

    if !form.order_by_field.is_empty() {
        let order = format!(" ORDER BY \"{}\" {}", form.order_by_field, form.order_by);
        template.push_text(&order);
    }

    let limit = if form.limit == 0 { DEFAULT_LIMIT } else { form.limit };
    template.push_text(&format!(" LIMIT {limit}"));
    Some(template)
}

/// Generates SQL with `$timestart` / `$timeend` placeholders; empty when the
/// form has no table.
#[must_use]
pub fn generate_sql(form: &BuilderFormState, window: &TimeWindow) -> String {
    build_template(form, window)
        .map(|t| t.to_placeholder_sql())
        .unwrap_or_default()
}

/// Generates SQL and substitutes the time window in one step.
///
/// # Examples
///
/// ```
/// use shared::sql::{
///     build_sql, BuilderFormState, Condition, FieldType, Operator, SortOrder, TsColumn,
/// };
/// use shared::time::TimeWindow;
///
/// let form = BuilderFormState::new("cpu")
///     .with_condition(
///         Condition::new("host", Operator::Eq, "h1").with_field_type(FieldType::String),
///     )
///     .with_order_by("ts", SortOrder::Desc)
///     .with_limit(100)
///     .with_ts_column(TsColumn::new("ts"));
/// let window = TimeWindow::new("'2024-01-01T00:00:00.000Z'", "'2024-01-02T00:00:00.000Z'");
///
/// assert_eq!(
///     build_sql(&form, &window),
///     "SELECT * FROM \"cpu\" WHERE \"host\" = 'h1' AND ts <= '2024-01-02T00:00:00.000Z' \
///      AND ts >= '2024-01-01T00:00:00.000Z' ORDER BY \"ts\" DESC LIMIT 100"
/// );
/// ```
#[must_use]
pub fn build_sql(form: &BuilderFormState, window: &TimeWindow) -> String {
    build_template(form, window)
        .map(|t| t.render(window))
        .unwrap_or_default()
}
