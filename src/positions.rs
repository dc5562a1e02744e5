//! Traccar data model and position timestamp handling.
//!
//! Only the fields the monitor consumes are modeled; everything else in the
//! Traccar payloads is ignored on deserialize. Coordinates stay `Option` so
//! a position without them is treated as unusable rather than as (0, 0).

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A tracker registered with the position source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// A position report for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub device_id: i64,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub device_time: Option<String>,
    #[serde(default)]
    pub fix_time: Option<String>,
    #[serde(default)]
    pub server_time: Option<String>,
}

impl Position {
    /// Timestamp for freshness checks, in epoch milliseconds.
    ///
    /// Tries `deviceTime`, `fixTime`, `serverTime` in that order and keeps
    /// the first one that parses. An unparseable value falls through to the
    /// next field instead of poisoning the whole position.
    pub fn time_ms(&self) -> Option<i64> {
        [&self.device_time, &self.fix_time, &self.server_time]
            .into_iter()
            .flatten()
            .find_map(|text| parse_time_ms(text))
    }

    /// Raw timestamp string in the same priority order, for templates.
    pub fn time_raw(&self) -> Option<&str> {
        [&self.device_time, &self.fix_time, &self.server_time]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|text| !text.is_empty())
    }
}

/// Parse a position timestamp into epoch milliseconds.
///
/// Accepts RFC 3339 (offset or `Z`, optional fractional seconds), a naive
/// `YYYY-MM-DD HH:MM:SS` form with `T` or space separator taken as UTC, and
/// bare epoch milliseconds as a digit string.
pub fn parse_time_ms(value: &str) -> Option<i64> {
    let text = value.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }

    if text.bytes().all(|b| b.is_ascii_digit()) {
        return text.parse::<i64>().ok();
    }

    None
}

/// Format a raw position timestamp as `YYYY-MM-DDTHH:MM:SSZ` in UTC.
///
/// Unparseable input yields an empty string so message templates always
/// render.
pub fn to_iso_time(value: &str) -> String {
    parse_time_ms(value)
        .and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_default()
}
