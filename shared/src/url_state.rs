//! Shareable query state carried in a URL query string.
//!
//! The query panels mirror their editor mode, time selection, SQL text and
//! builder form into the page URL so a link reproduces the query. Values for
//! `editorSql` and `builderForm` are URL-encoded before being placed in the
//! query string, which encodes them once more.

use crate::sql::BuilderFormState;
use crate::time::{TimeRange, DEFAULT_RELATIVE_MINUTES};
use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Query string key for the editor mode.
pub const EDITOR_TYPE_KEY: &str = "editorType";
/// Query string key for the relative window length in minutes.
pub const TIME_LENGTH_KEY: &str = "timeLength";
/// Query string key repeated for each absolute bound.
pub const TIME_RANGE_KEY: &str = "timeRange";
/// Query string key for the text editor SQL.
pub const EDITOR_SQL_KEY: &str = "editorSql";
/// Query string key for the builder form JSON.
pub const BUILDER_FORM_KEY: &str = "builderForm";
/// Query string key for the selected table.
pub const TABLE_KEY: &str = "table";

/// Which editor the query panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorType {
    /// The visual query builder.
    #[default]
    Builder,
    /// The free-text SQL editor.
    Text,
}

impl EditorType {
    /// The query string spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Builder => "builder",
            Self::Text => "text",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "builder" => Some(Self::Builder),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Query panel state that round-trips through the URL.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryUrlState {
    /// Active editor.
    pub editor_type: EditorType,
    /// Relative window in minutes; ignored when `time_range` is set.
    pub time_length: u32,
    /// Absolute window as unix seconds.
    pub time_range: Option<(i64, i64)>,
    /// Selected table, if the panel tracks one.
    pub table: Option<String>,
    /// SQL in the text editor.
    pub editor_sql: String,
    /// Builder form.
    pub builder_form: Option<BuilderFormState>,
}

impl Default for QueryUrlState {
    fn default() -> Self {
        Self {
            editor_type: EditorType::Builder,
            time_length: DEFAULT_RELATIVE_MINUTES,
            time_range: None,
            table: None,
            editor_sql: String::new(),
            builder_form: None,
        }
    }
}

impl QueryUrlState {
    /// Returns the query parameters for this state, values unencoded at the
    /// query string level.
    ///
    /// `timeRange` replaces `timeLength` when an absolute window is set. SQL
    /// is only kept in text mode and the builder form only in builder mode.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![(EDITOR_TYPE_KEY.to_string(), self.editor_type.as_str().to_string())];

        match self.time_range {
            Some((start, end)) => {
                pairs.push((TIME_RANGE_KEY.to_string(), start.to_string()));
                pairs.push((TIME_RANGE_KEY.to_string(), end.to_string()));
            }
            None => pairs.push((TIME_LENGTH_KEY.to_string(), self.time_length.to_string())),
        }

        if let Some(table) = self.table.as_deref().filter(|t| !t.is_empty()) {
            pairs.push((TABLE_KEY.to_string(), table.to_string()));
        }

        if self.editor_type == EditorType::Text && !self.editor_sql.is_empty() {
            pairs.push((
                EDITOR_SQL_KEY.to_string(),
                urlencoding::encode(&self.editor_sql).into_owned(),
            ));
        }

        if self.editor_type == EditorType::Builder {
            if let Some(form) = &self.builder_form {
                match serde_json::to_string(form) {
                    Ok(json) => pairs.push((
                        BUILDER_FORM_KEY.to_string(),
                        urlencoding::encode(&json).into_owned(),
                    )),
                    Err(e) => tracing::warn!(error = %e, "Failed to serialize builder form"),
                }
            }
        }

        pairs
    }

    /// Renders the state as a query string without the leading `?`.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared::url_state::{EditorType, QueryUrlState};
    ///
    /// let state = QueryUrlState {
    ///     editor_type: EditorType::Text,
    ///     editor_sql: "SELECT 1".to_string(),
    ///     ..QueryUrlState::default()
    /// };
    /// let query = state.to_query_string();
    /// assert_eq!(query, "editorType=text&timeLength=10&editorSql=SELECT%25201");
    /// assert_eq!(QueryUrlState::from_query_string(&query), state);
    /// ```
    #[must_use]
    pub fn to_query_string(&self) -> String {
        self.to_query_pairs()
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Restores state from a query string, with or without the leading `?`.
    ///
    /// Unknown keys are ignored. Values that cannot be decoded keep their
    /// defaults and are logged; this never fails.
    #[must_use]
    pub fn from_query_string(query: &str) -> Self {
        let mut state = Self::default();
        let mut range_bounds = Vec::new();

        for pair in query.trim_start_matches('?').split('&').filter(|p| !p.is_empty()) {
            let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let Some(value) = decode_form_value(raw) else {
                tracing::warn!(key = %key, "Ignoring undecodable query parameter");
                continue;
            };

            match key {
                EDITOR_TYPE_KEY => {
                    state.editor_type = EditorType::parse(&value).unwrap_or_default();
                }
                TIME_LENGTH_KEY => {
                    if let Ok(length) = value.trim().parse::<u32>() {
                        state.time_length = length;
                    }
                }
                TIME_RANGE_KEY => range_bounds.push(value),
                TABLE_KEY => state.table = Some(value),
                EDITOR_SQL_KEY => match decode(&value) {
                    Some(sql) => state.editor_sql = sql,
                    None => tracing::warn!("Failed to decode editor SQL from URL"),
                },
                BUILDER_FORM_KEY => {
                    state.builder_form = decode(&value).and_then(|json| {
                        serde_json::from_str(&json)
                            .map_err(|e| {
                                tracing::warn!(
                                    error = %e,
                                    "Failed to parse builder form state from URL"
                                );
                            })
                            .ok()
                    });
                }
                _ => {}
            }
        }

        if let [start, end] = range_bounds.as_slice() {
            if let (Ok(start), Ok(end)) = (start.trim().parse(), end.trim().parse()) {
                state.time_range = Some((start, end));
            }
        }

        state
    }

    /// The selected time range: the absolute window when set, otherwise the
    /// relative length.
    #[must_use]
    pub fn time_range(&self) -> TimeRange {
        if let Some((start, end)) = self.time_range {
            let bounds = (DateTime::from_timestamp(start, 0), DateTime::from_timestamp(end, 0));
            if let (Some(start), Some(end)) = bounds {
                return TimeRange::Absolute { start, end };
            }
        }
        TimeRange::relative(self.time_length)
    }
}

fn decode(value: &str) -> Option<String> {
    urlencoding::decode(value).ok().map(std::borrow::Cow::into_owned)
}

/// Decodes a raw query parameter, where `+` stands for a space.
fn decode_form_value(value: &str) -> Option<String> {
    decode(&value.replace('+', " "))
}
