use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::limits::*;
use crate::model::*;

use super::tokens::text_value;
use super::EngineError;

/// Offset-less date-times, read as UTC.
const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a stored timestamp into epoch milliseconds.
///
/// Numbers are already milliseconds, and fractions truncate toward zero. Text
/// may be a decimal number of milliseconds (`"1714521600000"`,
/// `"1714521600000.5"`), RFC 3339, or a bare date read as midnight UTC.
///
/// ISO-8601 date-times without an offset are read as UTC, never in the host's
/// local zone. JavaScript's `Date.parse` reads the same text as local time, so
/// a window stored as `"2024-05-01T09:00:00"` lands at 09:00Z here whatever
/// machine runs the reconciliation.
pub fn parse_timestamp(raw: &RawValue) -> Option<Ms> {
    match raw {
        RawValue::Number(n) => n.as_i64().or_else(|| {
            let f = n.as_f64()?;
            f.is_finite().then(|| f.trunc() as Ms)
        }),
        RawValue::Null | RawValue::Other(_) => None,
        _ => parse_timestamp_text(&text_value(raw)?),
    }
}

fn parse_timestamp_text(text: &str) -> Option<Ms> {
    if is_decimal(text) {
        return match text.parse::<Ms>() {
            Ok(ms) => Some(ms),
            Err(_) => {
                let f: f64 = text.parse().ok()?;
                f.is_finite().then(|| f.trunc() as Ms)
            }
        };
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    let slashed = text.replace('/', "-");
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&slashed, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis());
        }
    }
    None
}

/// Optional sign, digits, then at most one fractional part.
fn is_decimal(text: &str) -> bool {
    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    !(whole.is_empty() && frac.is_empty()) && digits(whole) && digits(frac)
}

/// Build a query window from a record's two bound fields.
///
/// Absent or unparseable bounds, non-positive or out-of-range timestamps and
/// `start >= end` are all rejected; callers skip such records.
pub fn parse_window(start: &RawValue, end: &RawValue) -> Result<Span, EngineError> {
    let start = parse_timestamp(start).ok_or(EngineError::MissingBound("start"))?;
    let end = parse_timestamp(end).ok_or(EngineError::MissingBound("end"))?;
    validate_window(start, end)
}

pub fn validate_window(start: Ms, end: Ms) -> Result<Span, EngineError> {
    for ms in [start, end] {
        if !(MIN_VALID_TIMESTAMP_MS..=MAX_VALID_TIMESTAMP_MS).contains(&ms) {
            return Err(EngineError::TimestampOutOfRange(ms));
        }
    }
    if start >= end {
        return Err(EngineError::InvalidWindow { start, end });
    }
    Ok(Span::new(start, end))
}
