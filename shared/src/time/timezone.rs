//! Timezone normalization and display.
//!
//! User-entered timezones are one of `browser`, `UTC`, a fixed `±HH:MM`
//! offset or an IANA zone name. Every input normalizes to one of those
//! canonical forms; anything unrecognized becomes `UTC`.
//!
//! Nothing here reads the system clock or locale. The caller's zone and
//! current instant are passed in as a [`ClientContext`].

use chrono::{DateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use nom::{
    branch::alt,
    bytes::complete::take_while_m_n,
    character::complete::{char, one_of},
    combinator::{all_consuming, map_res, opt},
    sequence::preceded,
    IResult, Parser,
};
use serde::{Deserialize, Serialize};

/// Largest offset hour accepted (UTC+14 is the real-world maximum).
const MAX_OFFSET_HOURS: u8 = 14;

/// A fixed UTC offset of the form `±HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtcOffset {
    negative: bool,
    hours: u8,
    minutes: u8,
}

impl UtcOffset {
    /// Creates an offset, returning `None` outside `-14:00..=+14:00` or for
    /// minutes of 60 or more.
    #[must_use]
    pub fn new(negative: bool, hours: u8, minutes: u8) -> Option<Self> {
        if hours > MAX_OFFSET_HOURS || minutes >= 60 || (hours == MAX_OFFSET_HOURS && minutes > 0) {
            return None;
        }
        Some(Self {
            negative,
            hours,
            minutes,
        })
    }

    /// Creates an offset from signed total minutes.
    #[must_use]
    pub fn from_minutes(total: i32) -> Option<Self> {
        let abs = total.unsigned_abs();
        let hours = u8::try_from(abs / 60).ok()?;
        let minutes = u8::try_from(abs % 60).ok()?;
        Self::new(total < 0, hours, minutes)
    }

    /// Signed offset in minutes east of UTC.
    #[must_use]
    pub fn total_minutes(self) -> i32 {
        let minutes = i32::from(self.hours) * 60 + i32::from(self.minutes);
        if self.negative {
            -minutes
        } else {
            minutes
        }
    }

    /// Parses `±H`, `±HH`, `±HHMM`, `±H:MM` or `±HH:MM`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let (_, (sign, (hours, minutes))) = offset(value).ok()?;
        Self::new(sign == '-', hours, minutes.unwrap_or(0))
    }
}

impl std::fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.negative { '-' } else { '+' };
        write!(f, "{sign}{:02}:{:02}", self.hours, self.minutes)
    }
}

/// A canonical timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timezone {
    /// Whatever zone the client runs in.
    Browser,
    /// Coordinated Universal Time.
    #[default]
    Utc,
    /// A fixed offset.
    Offset(UtcOffset),
    /// An IANA zone.
    Named(Tz),
}

impl Timezone {
    /// Offset from UTC, in minutes, at `instant`. `Browser` resolves through
    /// the client context.
    #[must_use]
    pub fn offset_minutes_at(&self, instant: DateTime<Utc>, client: &ClientContext) -> i32 {
        match self {
            Self::Browser => client.utc_offset_minutes(),
            Self::Utc => 0,
            Self::Offset(offset) => offset.total_minutes(),
            Self::Named(tz) => {
                let offset = tz.offset_from_utc_datetime(&instant.naive_utc()).fix();
                offset.local_minus_utc() / 60
            }
        }
    }
}

impl std::fmt::Display for Timezone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Browser => write!(f, "browser"),
            Self::Utc => write!(f, "UTC"),
            Self::Offset(offset) => write!(f, "{offset}"),
            Self::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}

impl std::str::FromStr for Timezone {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(normalize_timezone(s))
    }
}

impl Serialize for Timezone {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(normalize_timezone(&raw))
    }
}

/// The client's ambient zone and clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientContext {
    zone: Timezone,
    now: DateTime<Utc>,
}

impl ClientContext {
    /// Creates a context for a client in `zone` at instant `now`.
    ///
    /// `Browser` cannot describe itself and is treated as UTC.
    #[must_use]
    pub fn new(zone: Timezone, now: DateTime<Utc>) -> Self {
        let zone = match zone {
            Timezone::Browser => Timezone::Utc,
            other => other,
        };
        Self { zone, now }
    }

    /// A UTC client at `now`.
    #[must_use]
    pub fn utc(now: DateTime<Utc>) -> Self {
        Self::new(Timezone::Utc, now)
    }

    /// The client's zone.
    #[must_use]
    pub fn zone(&self) -> Timezone {
        self.zone
    }

    /// The client's current instant.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// The client's current offset from UTC in minutes.
    #[must_use]
    pub fn utc_offset_minutes(&self) -> i32 {
        self.zone.offset_minutes_at(self.now, self)
    }
}

/// Normalizes a user-entered timezone. Never fails.
///
/// # Examples
///
/// ```
/// use shared::time::normalize_timezone_str;
///
/// assert_eq!(normalize_timezone_str(""), "UTC");
/// assert_eq!(normalize_timezone_str("+8:00"), "+08:00");
/// assert_eq!(normalize_timezone_str("asia/shanghai"), "Asia/Shanghai");
/// assert_eq!(normalize_timezone_str("not/a-zone"), "UTC");
/// ```
#[must_use]
pub fn normalize_timezone(raw: &str) -> Timezone {
    let tz = raw.trim();
    if tz.is_empty() {
        return Timezone::Utc;
    }
    if tz.eq_ignore_ascii_case("browser") {
        return Timezone::Browser;
    }
    if tz.eq_ignore_ascii_case("utc") {
        return Timezone::Utc;
    }
    if let Some(offset) = UtcOffset::parse(tz) {
        return Timezone::Offset(offset);
    }
    if let Ok(zone) = Tz::from_str_insensitive(tz) {
        return Timezone::Named(zone);
    }
    tracing::debug!(timezone = %raw, "Unrecognized timezone, falling back to UTC");
    Timezone::Utc
}

/// String form of [`normalize_timezone`].
#[must_use]
pub fn normalize_timezone_str(raw: &str) -> String {
    normalize_timezone(raw).to_string()
}

/// Normalizes a possibly missing stored timezone; missing or blank is UTC.
#[must_use]
pub fn normalize_legacy_timezone(tz: Option<&str>) -> Timezone {
    tz.map_or(Timezone::Utc, normalize_timezone)
}

/// Returns the short label shown next to timestamps.
///
/// The label is empty when it would be redundant: for `browser`, and for
/// zones that are the client's own zone or share its current offset.
/// Otherwise UTC is `"UTC"`, offsets are shortened to `±HH` and IANA zones
/// keep their name.
#[must_use]
pub fn format_timezone_label(tz: &str, client: &ClientContext) -> String {
    let normalized = normalize_timezone(tz);
    match normalized {
        Timezone::Browser => String::new(),
        Timezone::Utc => "UTC".to_string(),
        Timezone::Offset(offset) => {
            if offset.total_minutes() == client.utc_offset_minutes() {
                String::new()
            } else if offset.total_minutes() == 0 {
                "UTC".to_string()
            } else {
                offset.to_string()[..3].to_string()
            }
        }
        Timezone::Named(zone) => {
            let same_zone = client.zone() == normalized;
            let same_offset =
                normalized.offset_minutes_at(client.now(), client) == client.utc_offset_minutes();
            if same_zone || same_offset {
                String::new()
            } else {
                zone.name().to_string()
            }
        }
    }
}

/// Returns the timezone to send to the database: `browser` resolves to the
/// client's current offset, everything else to its canonical form.
#[must_use]
pub fn db_timezone(tz: &str, client: &ClientContext) -> String {
    match normalize_timezone(tz) {
        Timezone::Browser => UtcOffset::from_minutes(client.utc_offset_minutes())
            .map_or_else(|| "UTC".to_string(), |offset| offset.to_string()),
        other => other.to_string(),
    }
}

// ============================================================================
// Timestamp formatting
// ============================================================================

/// Storage unit of a timestamp column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampUnit {
    /// Days since the epoch.
    Day,
    /// Seconds since the epoch.
    Second,
    /// Milliseconds since the epoch.
    Millisecond,
    /// Microseconds since the epoch.
    Microsecond,
    /// Nanoseconds since the epoch.
    Nanosecond,
}

impl TimestampUnit {
    /// Infers the unit from a column data type such as
    /// `TimestampMillisecond`, `timestamp(9)`, `Date` or `DateTime`.
    #[must_use]
    pub fn from_data_type(data_type: &str) -> Self {
        let lower = data_type.trim().to_ascii_lowercase();
        match lower.as_str() {
            "date" => Self::Day,
            "datetime" | "timestamp(3)" => Self::Millisecond,
            "timestamp" | "timestamp(0)" => Self::Second,
            "timestamp(6)" => Self::Microsecond,
            "timestamp(9)" => Self::Nanosecond,
            _ if lower.contains("timestampsecond") => Self::Second,
            _ if lower.contains("timestampmicrosecond") => Self::Microsecond,
            _ if lower.contains("timestampnanosecond") => Self::Nanosecond,
            _ => Self::Millisecond,
        }
    }

    /// Converts a value in this unit to milliseconds.
    #[must_use]
    pub fn to_millis(self, value: i64) -> i64 {
        match self {
            Self::Day => value.saturating_mul(86_400_000),
            Self::Second => value.saturating_mul(1000),
            Self::Millisecond => value,
            Self::Microsecond => value / 1000,
            Self::Nanosecond => value / 1_000_000,
        }
    }
}

/// Formats a raw timestamp column value as `YYYY-MM-DD HH:MM:SS.mmm` in `tz`.
///
/// Returns `None` when the value is outside the representable date range.
#[must_use]
pub fn format_timestamp(
    value: i64,
    data_type: &str,
    tz: Timezone,
    client: &ClientContext,
) -> Option<String> {
    const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
    let millis = TimestampUnit::from_data_type(data_type).to_millis(value);
    let instant = DateTime::from_timestamp_millis(millis)?;
    let formatted = match tz {
        Timezone::Named(zone) => instant.with_timezone(&zone).format(FORMAT).to_string(),
        other => {
            let secs = other.offset_minutes_at(instant, client) * 60;
            let offset = chrono::FixedOffset::east_opt(secs)?;
            instant.with_timezone(&offset).format(FORMAT).to_string()
        }
    };
    Some(formatted)
}

// ============================================================================
// Offset parser
// ============================================================================

fn offset(input: &str) -> IResult<&str, (char, (u8, Option<u8>))> {
    (
        one_of("+-"),
        alt((
            all_consuming((digits(2), opt(offset_minutes()))),
            all_consuming((digits(1), opt(offset_minutes()))),
        )),
    )
        .parse(input)
}

fn offset_minutes<'a>() -> impl Parser<&'a str, Output = u8, Error = nom::error::Error<&'a str>> {
    preceded(opt(char(':')), digits(2))
}

fn digits<'a>(
    count: usize,
) -> impl Parser<&'a str, Output = u8, Error = nom::error::Error<&'a str>> {
    map_res(
        take_while_m_n(count, count, |c: char| c.is_ascii_digit()),
        |s: &str| s.parse::<u8>(),
    )
}
