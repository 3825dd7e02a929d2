use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::core::Timestamp;
use crate::error::TimeParseError;

/// Turns a raw time field into a [`Timestamp`]
pub trait TimeParser {
    fn parse_time(&self, raw: &Value) -> Result<Timestamp, TimeParseError>;
}

/// Accepts numeric seconds (as numbers or strings) and date-times.
///
/// Date-times become seconds since the Unix epoch. Supported forms are RFC 3339
/// and `YYYY-MM-DD HH:MM:SS[.fff]` (read as UTC).
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTimeParser;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

impl TimeParser for DefaultTimeParser {
    fn parse_time(&self, raw: &Value) -> Result<Timestamp, TimeParseError> {
        let seconds = match raw {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_time_str(s.trim()),
            _ => None,
        };

        match seconds {
            Some(seconds) if seconds.is_finite() => Ok(Timestamp(seconds)),
            _ => Err(TimeParseError::new(raw)),
        }
    }
}

fn parse_time_str(s: &str) -> Option<f64> {
    if let Ok(seconds) = s.parse::<f64>() {
        return Some(seconds);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(s) {
        return Some(epoch_seconds(datetime.with_timezone(&Utc)));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| epoch_seconds(naive.and_utc()))
}

fn epoch_seconds(datetime: DateTime<Utc>) -> f64 {
    datetime.timestamp_millis() as f64 / 1000.0
}
