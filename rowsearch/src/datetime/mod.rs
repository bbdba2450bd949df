// Date parsing and display for flattened datetime cells.
// All display happens in UTC unless the field ignores timezones, in which
// case the stored wall-clock time is shown as-is.

use crate::schema::FieldSchema;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde_json::Value;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];

/// How a datetime field wants to be parsed and shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateOptions {
    pub time_only: bool,
    pub enable_time: bool,
    pub ignore_timezones: bool,
}

impl Default for DateOptions {
    fn default() -> Self {
        DateOptions {
            time_only: false,
            enable_time: true,
            ignore_timezones: false,
        }
    }
}

impl DateOptions {
    pub fn for_field(field: &FieldSchema) -> Self {
        DateOptions {
            time_only: field.time_only,
            enable_time: !field.date_only,
            ignore_timezones: field.ignore_timezones,
        }
    }
}

/// Parse a stored datetime value. Strings and epoch milliseconds are
/// understood; anything unparseable yields `None`.
pub fn parse_date(value: &Value, opts: &DateOptions) -> Option<NaiveDateTime> {
    let parsed = match value {
        Value::String(s) => parse_date_str(s.trim(), opts)?,
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            DateTime::from_timestamp_millis(millis)?.naive_utc()
        }
        _ => return None,
    };
    truncate(parsed, opts.enable_time)
}

fn parse_date_str(s: &str, opts: &DateOptions) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }

    // Bare times are anchored to the epoch date.
    if let Some(time) = TIME_FORMATS
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(s, f).ok())
    {
        return NaiveDate::from_ymd_opt(1970, 1, 1).map(|d| d.and_time(time));
    }

    // Date-only values are often stored as UTC midnight; drop the zone so
    // the calendar day does not shift.
    let s = if !opts.enable_time {
        s.strip_suffix('Z').unwrap_or(s)
    } else {
        s
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(if opts.ignore_timezones {
            dt.naive_local()
        } else {
            dt.naive_utc()
        });
    }

    if let Some(dt) = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
    {
        return Some(dt);
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn truncate(dt: NaiveDateTime, enable_time: bool) -> Option<NaiveDateTime> {
    if enable_time {
        dt.with_nanosecond(0)
    } else {
        dt.date().and_hms_opt(0, 0, 0)
    }
}

/// Render a parsed date for display; `None` renders as an empty string.
pub fn date_display_value(parsed: Option<NaiveDateTime>, opts: &DateOptions) -> String {
    let Some(dt) = parsed else {
        return String::new();
    };
    let format = if opts.time_only {
        "%H:%M"
    } else if !opts.enable_time {
        "%B %-d %Y"
    } else {
        "%B %-d %Y, %H:%M"
    };
    dt.format(format).to_string()
}

/// Parse then render in one step.
pub fn format_date(value: &Value, opts: &DateOptions) -> String {
    date_display_value(parse_date(value, opts), opts)
}
