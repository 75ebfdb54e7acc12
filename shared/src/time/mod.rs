//! Time windows and timezones.

pub mod range;
pub mod timezone;

pub use range::{
    calculate_step, format_nanos_utc, replace_time_placeholders, TimeRange, TimeRangeError,
    TimeWindow, DEFAULT_MIN_STEP_SECS, DEFAULT_RELATIVE_MINUTES, TIME_END_PLACEHOLDER,
    TIME_START_PLACEHOLDER,
};
pub use timezone::{
    db_timezone, format_timestamp, format_timezone_label, normalize_legacy_timezone,
    normalize_timezone, normalize_timezone_str, ClientContext, TimestampUnit, Timezone, UtcOffset,
};
