//! Media duration parsing and formatting.
//!
//! Durations arrive in three surface forms: compact (`"1h30m"`, `"90s"`,
//! bare seconds `"90"`), colon timecode (`"HH:MM:SS"`, `"HH:MM:SS.fff"`,
//! `"MM:SS"`), and ISO-8601 (`"PT1H30M"`). All resolve to a
//! nanosecond-precise duration. The emitted form is always the compact one,
//! so values round-trip through JSON as strings.

use std::fmt;
use std::time::Duration;

use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Maximum duration accepted from user input (7 days).
pub const MAX_DURATION_SECS: u64 = 7 * 24 * 3600;

/// A nanosecond-precise media duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MediaDuration(Duration);

impl MediaDuration {
    pub const ZERO: MediaDuration = MediaDuration(Duration::ZERO);

    pub fn new(inner: Duration) -> Self {
        Self(inner)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Self(Duration::from_secs_f64(secs.max(0.0)))
    }

    pub fn from_nanos(nanos: u128) -> Self {
        Self(Duration::new(
            (nanos / 1_000_000_000) as u64,
            (nanos % 1_000_000_000) as u32,
        ))
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }

    pub fn as_nanos(&self) -> u128 {
        self.0.as_nanos()
    }

    pub fn inner(&self) -> Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn saturating_sub(&self, other: MediaDuration) -> MediaDuration {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn saturating_add(&self, other: MediaDuration) -> MediaDuration {
        Self(self.0.saturating_add(other.0))
    }

    /// Parse a duration string, trying each surface form in order:
    /// compact, colon timecode, ISO-8601. The first success wins.
    pub fn parse(s: &str) -> Result<Self, DurationParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DurationParseError::Empty);
        }

        if let Ok(d) = parse_compact(s) {
            return Self::bounded(d);
        }
        if let Ok(d) = parse_timecode(s) {
            return Self::bounded(d);
        }
        if let Ok(d) = parse_iso8601(s) {
            return Self::bounded(d);
        }

        Err(DurationParseError::UnrecognizedFormat(s.to_string()))
    }

    /// Parse a colon timecode only (`HH:MM:SS[.fff]` or `MM:SS`).
    pub fn parse_timecode(s: &str) -> Result<Self, DurationParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DurationParseError::Empty);
        }
        Self::bounded(parse_timecode(s)?)
    }

    fn bounded(d: Duration) -> Result<Self, DurationParseError> {
        if d.as_secs() > MAX_DURATION_SECS {
            return Err(DurationParseError::TooLong(d.as_secs()));
        }
        Ok(Self(d))
    }

    /// Compact form: `1h30m`, `45s`, `12.5s`, `0s`. Lossless for any value
    /// this type can hold; `parse(d.to_compact()) == d`.
    pub fn to_compact(&self) -> String {
        let total_secs = self.0.as_secs();
        let nanos = self.0.subsec_nanos();

        let hours = total_secs / 3600;
        let mins = (total_secs % 3600) / 60;
        let secs = total_secs % 60;

        let mut out = String::new();
        if hours > 0 {
            out.push_str(&format!("{}h", hours));
        }
        if mins > 0 {
            out.push_str(&format!("{}m", mins));
        }
        if nanos > 0 {
            let frac = format!("{:09}", nanos);
            let frac = frac.trim_end_matches('0');
            out.push_str(&format!("{}.{}s", secs, frac));
        } else if secs > 0 || out.is_empty() {
            out.push_str(&format!("{}s", secs));
        }
        out
    }

    /// Seconds with millisecond precision, as filter expressions want them
    /// (`10.000`).
    pub fn to_filter_secs(&self) -> String {
        format!("{:.3}", self.as_secs_f64())
    }

    /// `HH:MM:SS.mmm` timecode.
    pub fn to_timecode(&self) -> String {
        let total_secs = self.0.as_secs();
        let millis = self.0.subsec_millis();
        format!(
            "{:02}:{:02}:{:02}.{:03}",
            total_secs / 3600,
            (total_secs % 3600) / 60,
            total_secs % 60,
            millis
        )
    }
}

impl fmt::Display for MediaDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_compact())
    }
}

impl From<Duration> for MediaDuration {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl Serialize for MediaDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_compact())
    }
}

impl<'de> Deserialize<'de> for MediaDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        MediaDuration::parse(&s).map_err(D::Error::custom)
    }
}

impl JsonSchema for MediaDuration {
    fn schema_name() -> String {
        "MediaDuration".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

/// Duration parsing error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DurationParseError {
    #[error("duration cannot be empty")]
    Empty,

    #[error("invalid {0} value: {1}")]
    InvalidComponent(&'static str, String),

    #[error("unrecognized duration format '{0}'")]
    UnrecognizedFormat(String),

    #[error("duration of {0} seconds exceeds the maximum")]
    TooLong(u64),
}

/// Compact form: sequence of `<number><unit>` tokens (`h`, `m`, `s`, `ms`),
/// or a bare number meaning seconds. Fractions are allowed on any token.
fn parse_compact(s: &str) -> Result<Duration, DurationParseError> {
    // Bare number means seconds.
    if s.chars().all(|c| c.is_ascii_digit() || c == '.') {
        let secs: f64 = s
            .parse()
            .map_err(|_| DurationParseError::InvalidComponent("seconds", s.to_string()))?;
        return Ok(Duration::from_secs_f64(secs));
    }

    let mut total = Duration::ZERO;
    let mut number = String::new();
    let mut unit = String::new();
    let mut saw_token = false;

    // Walk `number unit` pairs; a unit ends when the next digit begins.
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
        } else if c.is_ascii_alphabetic() {
            unit.push(c);
        } else {
            return Err(DurationParseError::UnrecognizedFormat(s.to_string()));
        }

        let boundary = match chars.peek() {
            Some(next) => !unit.is_empty() && (next.is_ascii_digit() || *next == '.'),
            None => true,
        };

        if boundary {
            if number.is_empty() || unit.is_empty() {
                return Err(DurationParseError::UnrecognizedFormat(s.to_string()));
            }
            let value: f64 = number
                .parse()
                .map_err(|_| DurationParseError::InvalidComponent("number", number.clone()))?;
            let scaled = match unit.as_str() {
                "h" => Duration::from_secs_f64(value * 3600.0),
                "m" => Duration::from_secs_f64(value * 60.0),
                "s" => Duration::from_secs_f64(value),
                "ms" => Duration::from_secs_f64(value / 1000.0),
                _ => return Err(DurationParseError::InvalidComponent("unit", unit.clone())),
            };
            total += scaled;
            number.clear();
            unit.clear();
            saw_token = true;
        }
    }

    if !saw_token {
        return Err(DurationParseError::UnrecognizedFormat(s.to_string()));
    }
    Ok(total)
}

/// Colon timecode: `HH:MM:SS[.fff]` or `MM:SS[.fff]`.
fn parse_timecode(s: &str) -> Result<Duration, DurationParseError> {
    let parts: Vec<&str> = s.split(':').collect();
    let (hours, mins, secs): (f64, f64, f64) = match parts.len() {
        2 => {
            let m = parse_part("minutes", parts[0])?;
            let sec = parse_part("seconds", parts[1])?;
            (0.0, m, sec)
        }
        3 => {
            let h = parse_part("hours", parts[0])?;
            let m = parse_part("minutes", parts[1])?;
            let sec = parse_part("seconds", parts[2])?;
            (h, m, sec)
        }
        _ => return Err(DurationParseError::UnrecognizedFormat(s.to_string())),
    };

    Ok(Duration::from_secs_f64(hours * 3600.0 + mins * 60.0 + secs))
}

fn parse_part(name: &'static str, raw: &str) -> Result<f64, DurationParseError> {
    let value: f64 = raw
        .parse()
        .map_err(|_| DurationParseError::InvalidComponent(name, raw.to_string()))?;
    if value < 0.0 {
        return Err(DurationParseError::InvalidComponent(name, raw.to_string()));
    }
    Ok(value)
}

/// ISO-8601 duration: `PT1H30M`, `PT90S`, `PT0.5S`. Only the time designator
/// is supported; date components are out of scope for media timestamps.
fn parse_iso8601(s: &str) -> Result<Duration, DurationParseError> {
    let upper = s.to_ascii_uppercase();
    let body = upper
        .strip_prefix("PT")
        .ok_or_else(|| DurationParseError::UnrecognizedFormat(s.to_string()))?;
    if body.is_empty() {
        return Err(DurationParseError::UnrecognizedFormat(s.to_string()));
    }

    let mut total = Duration::ZERO;
    let mut number = String::new();
    for c in body.chars() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
            continue;
        }
        let value: f64 = number
            .parse()
            .map_err(|_| DurationParseError::InvalidComponent("number", number.clone()))?;
        number.clear();
        let scaled = match c {
            'H' => Duration::from_secs_f64(value * 3600.0),
            'M' => Duration::from_secs_f64(value * 60.0),
            'S' => Duration::from_secs_f64(value),
            _ => {
                return Err(DurationParseError::InvalidComponent(
                    "designator",
                    c.to_string(),
                ))
            }
        };
        total += scaled;
    }

    if !number.is_empty() {
        // Trailing digits without a designator.
        return Err(DurationParseError::UnrecognizedFormat(s.to_string()));
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compact_forms() {
        assert_eq!(MediaDuration::parse("1h30m").unwrap().as_secs_f64(), 5400.0);
        assert_eq!(MediaDuration::parse("90s").unwrap().as_secs_f64(), 90.0);
        assert_eq!(MediaDuration::parse("90").unwrap().as_secs_f64(), 90.0);
        assert_eq!(MediaDuration::parse("250ms").unwrap().as_secs_f64(), 0.25);
        assert_eq!(
            MediaDuration::parse("1h2m3s").unwrap().as_secs_f64(),
            3723.0
        );
        assert!((MediaDuration::parse("12.5").unwrap().as_secs_f64() - 12.5).abs() < 1e-9);
    }

    #[test]
    fn parses_timecode_forms() {
        assert_eq!(
            MediaDuration::parse("00:00:30").unwrap().as_secs_f64(),
            30.0
        );
        assert_eq!(
            MediaDuration::parse("01:30:00").unwrap().as_secs_f64(),
            5400.0
        );
        assert_eq!(MediaDuration::parse("05:30").unwrap().as_secs_f64(), 330.0);
        let with_frac = MediaDuration::parse("00:00:30.500").unwrap();
        assert!((with_frac.as_secs_f64() - 30.5).abs() < 1e-6);
    }

    #[test]
    fn parses_iso_forms() {
        assert_eq!(
            MediaDuration::parse("PT1H30M").unwrap().as_secs_f64(),
            5400.0
        );
        assert_eq!(MediaDuration::parse("PT90S").unwrap().as_secs_f64(), 90.0);
        assert!((MediaDuration::parse("PT0.5S").unwrap().as_secs_f64() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_garbage() {
        assert!(MediaDuration::parse("").is_err());
        assert!(MediaDuration::parse("abc").is_err());
        assert!(MediaDuration::parse("1:2:3:4").is_err());
        assert!(MediaDuration::parse("PT").is_err());
        assert!(MediaDuration::parse("10x").is_err());
    }

    #[test]
    fn rejects_over_maximum() {
        assert!(matches!(
            MediaDuration::parse("200h"),
            Err(DurationParseError::TooLong(_))
        ));
    }

    #[test]
    fn compact_round_trips() {
        for s in ["1h30m", "90s", "00:10:00", "PT45S", "12.5", "1h2m3.25s", "0"] {
            let parsed = MediaDuration::parse(s).unwrap();
            let reparsed = MediaDuration::parse(&parsed.to_compact()).unwrap();
            assert_eq!(parsed, reparsed, "round-trip failed for {}", s);
        }
    }

    #[test]
    fn compact_emission() {
        assert_eq!(MediaDuration::from_secs(5400).to_compact(), "1h30m");
        assert_eq!(MediaDuration::from_secs(90).to_compact(), "1m30s");
        assert_eq!(MediaDuration::from_secs(0).to_compact(), "0s");
        assert_eq!(MediaDuration::from_secs_f64(45.5).to_compact(), "45.5s");
    }

    #[test]
    fn serde_round_trips_as_string() {
        let d = MediaDuration::parse("1h30m").unwrap();
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, "\"1h30m\"");
        let back: MediaDuration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn filter_secs_format() {
        assert_eq!(MediaDuration::from_secs(10).to_filter_secs(), "10.000");
        assert_eq!(MediaDuration::from_secs_f64(30.5).to_filter_secs(), "30.500");
    }

    #[test]
    fn timecode_emission() {
        assert_eq!(MediaDuration::from_secs(3661).to_timecode(), "01:01:01.000");
    }
}
