//! Decoding of the two timestamp encodings the deployment reports.
//!
//! Docker reports container start times as RFC 3339 strings
//! (`2018-05-15T12:09:54.123456789Z`), systemd reports activation times over
//! D-Bus as a typed microsecond count (`t 1526305170850190`). Both end up as a
//! [`TimestampPair`] so they can be logged, handed to `journalctl --since`, and
//! compared.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{HarnessError, Result};

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// The same instant as a UTC wall-clock string and as epoch seconds.
///
/// Only `epoch_seconds` takes part in ordering; the string is what gets logged
/// and passed to `journalctl`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampPair {
    pub display: String,
    pub epoch_seconds: f64,
}

impl TimestampPair {
    pub fn from_datetime(instant: DateTime<Utc>) -> Self {
        let epoch_seconds =
            instant.timestamp() as f64 + f64::from(instant.timestamp_subsec_nanos()) / 1e9;
        Self {
            display: instant.format(DISPLAY_FORMAT).to_string(),
            epoch_seconds,
        }
    }

    /// Strictly later than `other`. Equal instants are not "after".
    pub fn is_after(&self, other: &TimestampPair) -> bool {
        self.epoch_seconds > other.epoch_seconds
    }
}

impl fmt::Display for TimestampPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} UTC", self.display)
    }
}

/// Parses an ISO-8601 instant such as docker's `{{.State.StartedAt}}`.
///
/// Surrounding whitespace and quotes are ignored. Strings without an offset
/// are taken as UTC.
pub fn decode_iso8601_instant(text: &str) -> Result<TimestampPair> {
    let trimmed = text.trim().trim_matches(|c| c == '\'' || c == '"').trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(TimestampPair::from_datetime(instant.with_timezone(&Utc)));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(TimestampPair::from_datetime(naive.and_utc()));
        }
    }

    Err(HarnessError::parse(text, "not an ISO-8601 instant"))
}

/// Parses a busctl `ActiveEnterTimestamp` reply: `t <microseconds>`.
pub fn decode_epoch_micros_property(text: &str) -> Result<TimestampPair> {
    let token = text
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| HarnessError::parse(text, "expected '<type> <microseconds>'"))?;

    let micros: i64 = token
        .parse()
        .map_err(|e| HarnessError::parse(text, format!("'{token}' is not an integer: {e}")))?;

    let instant = DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| HarnessError::parse(text, "microseconds out of range"))?;

    Ok(TimestampPair {
        display: instant.format(DISPLAY_FORMAT).to_string(),
        epoch_seconds: micros as f64 / 1_000_000.0,
    })
}
