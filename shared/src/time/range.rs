//! Query time ranges and their SQL renderings.
//!
//! A time range is either "the last N minutes", an absolute pair of
//! instants, or no limit at all. SQL templates refer to the window through
//! the `$timestart` / `$timeend` placeholders; this module produces the
//! values substituted for them.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder token for the start of the time window.
pub const TIME_START_PLACEHOLDER: &str = "$timestart";

/// Placeholder token for the end of the time window.
pub const TIME_END_PLACEHOLDER: &str = "$timeend";

/// Relative window, in minutes, used when a placeholder has no value.
pub const DEFAULT_RELATIVE_MINUTES: u32 = 10;

/// Default minimum step, in seconds, for range queries.
pub const DEFAULT_MIN_STEP_SECS: i64 = 15;

/// Errors that can occur while building a time range.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeRangeError {
    /// The value is not an integer number of seconds.
    #[error("Invalid unix timestamp: '{0}'")]
    InvalidTimestamp(String),

    /// The timestamp cannot be represented as a date.
    #[error("Timestamp out of range: {0}")]
    OutOfRange(i64),
}

/// The time range selected for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TimeRange {
    /// No time restriction.
    #[default]
    All,
    /// The last `minutes` minutes up to now.
    Relative {
        /// Window length in minutes (always > 0).
        minutes: u32,
    },
    /// A fixed pair of instants.
    Absolute {
        /// Start of the window.
        start: DateTime<Utc>,
        /// End of the window.
        end: DateTime<Utc>,
    },
}

impl TimeRange {
    /// Creates a relative range; zero minutes means no time limit.
    #[must_use]
    pub fn relative(minutes: u32) -> Self {
        if minutes == 0 {
            Self::All
        } else {
            Self::Relative { minutes }
        }
    }

    /// Creates an absolute range from unix-second strings.
    ///
    /// # Errors
    ///
    /// Returns an error if either value is not an integer or is outside the
    /// range of representable dates.
    pub fn absolute_from_unix(start: &str, end: &str) -> Result<Self, TimeRangeError> {
        Ok(Self::Absolute {
            start: parse_unix_seconds(start)?,
            end: parse_unix_seconds(end)?,
        })
    }

    /// Returns the SQL values for the window.
    ///
    /// Absolute ranges become single-quoted ISO-8601 literals. Relative
    /// ranges become unquoted SQL expressions, so callers must not quote the
    /// pair uniformly. No limit yields an empty window.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared::time::TimeRange;
    ///
    /// let window = TimeRange::relative(15).values();
    /// assert_eq!(window.start.as_deref(), Some("now() - Interval '15m'"));
    /// assert_eq!(window.end.as_deref(), Some("now()"));
    ///
    /// assert!(TimeRange::relative(0).values().is_empty());
    /// ```
    #[must_use]
    pub fn values(&self) -> TimeWindow {
        match self {
            Self::Relative { minutes } if *minutes > 0 => TimeWindow {
                start: Some(relative_start(*minutes)),
                end: Some("now()".to_string()),
            },
            Self::Absolute { start, end } => TimeWindow {
                start: Some(iso_literal(start)),
                end: Some(iso_literal(end)),
            },
            Self::All | Self::Relative { .. } => TimeWindow::default(),
        }
    }

    /// Returns the window as unix seconds relative to `now`, or `None` for
    /// an unlimited range.
    #[must_use]
    pub fn unix_range(&self, now: DateTime<Utc>) -> Option<(i64, i64)> {
        match self {
            Self::Relative { minutes } if *minutes > 0 => {
                let end = now.timestamp();
                Some((end - i64::from(*minutes) * 60, end))
            }
            Self::Absolute { start, end } => Some((start.timestamp(), end.timestamp())),
            Self::All | Self::Relative { .. } => None,
        }
    }
}

/// SQL values for the start and end of a time window.
///
/// Either bound may be absent; both absent means "no time filter", never a
/// zero-length window.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeWindow {
    /// SQL value for `$timestart`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// SQL value for `$timeend`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl TimeWindow {
    /// Creates a window with both bounds.
    #[must_use]
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
        }
    }

    /// Builds a window from a `[start, end]` slice; empty strings and
    /// missing entries are treated as absent.
    #[must_use]
    pub fn from_values(values: &[String]) -> Self {
        let pick = |i: usize| values.get(i).filter(|v| !v.is_empty()).cloned();
        Self {
            start: pick(0),
            end: pick(1),
        }
    }

    /// Returns true if neither bound is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// The start value, falling back to the default relative window.
    #[must_use]
    pub fn start_or_default(&self) -> String {
        self.start
            .clone()
            .unwrap_or_else(|| relative_start(DEFAULT_RELATIVE_MINUTES))
    }

    /// The end value, falling back to `now()`.
    #[must_use]
    pub fn end_or_default(&self) -> String {
        self.end.clone().unwrap_or_else(|| "now()".to_string())
    }
}

/// Substitutes `$timestart` / `$timeend` in free-text SQL.
///
/// Missing bounds fall back to `now() - Interval '10m'` and `now()`.
///
/// # Examples
///
/// ```
/// use shared::time::{replace_time_placeholders, TimeWindow};
///
/// let sql = replace_time_placeholders(
///     "SELECT * WHERE t > $timestart AND t < $timeend",
///     &TimeWindow::default(),
/// );
/// assert_eq!(sql, "SELECT * WHERE t > now() - Interval '10m' AND t < now()");
/// ```
#[must_use]
pub fn replace_time_placeholders(sql: &str, window: &TimeWindow) -> String {
    sql.replace(TIME_START_PLACEHOLDER, &window.start_or_default())
        .replace(TIME_END_PLACEHOLDER, &window.end_or_default())
}

/// Computes the step, in seconds, for a range query over `[start, end]` so
/// that at most `max_data_points` points are returned.
///
/// The step never drops below `min_step` (15 seconds when `None`).
#[must_use]
pub fn calculate_step(
    start: i64,
    end: i64,
    max_data_points: u32,
    min_step: Option<i64>,
) -> i64 {
    let min_step = min_step.filter(|s| *s > 0).unwrap_or(DEFAULT_MIN_STEP_SECS);
    if max_data_points == 0 {
        return min_step;
    }
    let step = (end - start).div_euclid(i64::from(max_data_points));
    step.max(min_step)
}

/// Formats a nanosecond unix timestamp as an RFC 3339 UTC string with nine
/// fractional digits, the form used for pipeline versions.
#[must_use]
pub fn format_nanos_utc(nanos: i64) -> String {
    DateTime::from_timestamp_nanos(nanos).to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn relative_start(minutes: u32) -> String {
    format!("now() - Interval '{minutes}m'")
}

fn iso_literal(instant: &DateTime<Utc>) -> String {
    format!("'{}'", instant.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn parse_unix_seconds(value: &str) -> Result<DateTime<Utc>, TimeRangeError> {
    let secs = value
        .trim()
        .parse::<i64>()
        .map_err(|_| TimeRangeError::InvalidTimestamp(value.to_string()))?;
    DateTime::from_timestamp(secs, 0).ok_or(TimeRangeError::OutOfRange(secs))
}
