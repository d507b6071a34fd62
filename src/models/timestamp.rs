/// Wall-clock timestamps as exchanged on the message bus
///
/// Producers stamp frames as `YYYY-MM-DD HH:MM:SS.ffffff` in local time without
/// an offset, so timestamps are kept as `NaiveDateTime` end to end.
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serializer};

/// Format written on every outgoing payload (microsecond precision)
pub const WIRE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Accepts any number of fractional digits, including none
const PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub fn parse(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value.trim(), PARSE_FORMAT)
}

pub fn format(value: &NaiveDateTime) -> String {
    value.format(WIRE_FORMAT).to_string()
}

/// Seconds elapsed from `earlier` to `later`, negative when out of order
pub fn seconds_between(earlier: &NaiveDateTime, later: &NaiveDateTime) -> f64 {
    later
        .signed_duration_since(*earlier)
        .num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
        .unwrap_or(0.0)
}

pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(serde::de::Error::custom)
}
