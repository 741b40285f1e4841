//! FFmpeg progress extraction.
//!
//! FFmpeg writes periodic status lines to stderr:
//!
//! `frame=  899 fps=174 q=29.0 size=   12800kB time=00:00:32.51
//! bitrate=3224.5kbits/s speed=6.29x`
//!
//! Six fields are extracted by regex. Lines without `frame=` are ordinary
//! log output and yield no progress.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static FRAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"frame=\s*(\d+)").expect("valid regex"));
static FPS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"fps=\s*([\d.]+)").expect("valid regex"));
static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time=(\d+):(\d{2}):(\d{2})\.(\d{2})").expect("valid regex"));
static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"size=\s*(\d+)\s*[kK]i?B").expect("valid regex"));
static BITRATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"bitrate=\s*([\d.]+)\s*kbits/s").expect("valid regex"));
static SPEED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"speed=\s*([\d.]+)x").expect("valid regex"));

/// A parsed progress sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Current frame number
    pub frame: u64,
    /// Encoding frames per second
    pub fps: f64,
    /// Output timestamp in seconds
    pub time_secs: f64,
    /// Output size so far, in kB
    pub size_kb: u64,
    /// Output bitrate in kbit/s
    pub bitrate_kbps: f64,
    /// Encoding speed relative to realtime
    pub speed: f64,
    /// Percent complete against the known total duration; 0 when the total
    /// is unknown
    pub percent: f64,
}

/// Stateful parser over stderr lines.
#[derive(Debug, Clone, Default)]
pub struct ProgressParser {
    total_duration_secs: Option<f64>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser that can compute percentages against a total duration.
    pub fn with_total_duration(total_secs: f64) -> Self {
        Self {
            total_duration_secs: (total_secs > 0.0).then_some(total_secs),
        }
    }

    pub fn set_total_duration(&mut self, total_secs: f64) {
        self.total_duration_secs = (total_secs > 0.0).then_some(total_secs);
    }

    /// Extract a progress sample from one stderr line.
    pub fn parse_line(&self, line: &str) -> Option<Progress> {
        let frame = FRAME_RE.captures(line)?;
        let frame: u64 = frame.get(1)?.as_str().parse().ok()?;

        let fps = capture_f64(&FPS_RE, line).unwrap_or(0.0);
        let time_secs = TIME_RE
            .captures(line)
            .and_then(|c| {
                let hours: f64 = c.get(1)?.as_str().parse().ok()?;
                let minutes: f64 = c.get(2)?.as_str().parse().ok()?;
                let seconds: f64 = c.get(3)?.as_str().parse().ok()?;
                let centis: f64 = c.get(4)?.as_str().parse().ok()?;
                Some(hours * 3600.0 + minutes * 60.0 + seconds + centis * 0.01)
            })
            .unwrap_or(0.0);
        let size_kb = SIZE_RE
            .captures(line)
            .and_then(|c| c.get(1)?.as_str().parse().ok())
            .unwrap_or(0);
        let bitrate_kbps = capture_f64(&BITRATE_RE, line).unwrap_or(0.0);
        let speed = capture_f64(&SPEED_RE, line).unwrap_or(0.0);

        let percent = match self.total_duration_secs {
            Some(total) => (time_secs / total * 100.0).min(100.0),
            None => 0.0,
        };

        Some(Progress {
            frame,
            fps,
            time_secs,
            size_kb,
            bitrate_kbps,
            speed,
            percent,
        })
    }
}

fn capture_f64(re: &Regex, line: &str) -> Option<f64> {
    re.captures(line)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "frame=  899 fps=174 q=29.0 size=   12800kB time=00:00:32.51 bitrate=3224.5kbits/s speed=6.29x";

    #[test]
    fn parses_all_six_fields() {
        let progress = ProgressParser::new().parse_line(LINE).unwrap();
        assert_eq!(progress.frame, 899);
        assert!((progress.fps - 174.0).abs() < 1e-9);
        assert!((progress.time_secs - 32.51).abs() < 1e-9);
        assert_eq!(progress.size_kb, 12_800);
        assert!((progress.bitrate_kbps - 3224.5).abs() < 1e-9);
        assert!((progress.speed - 6.29).abs() < 1e-9);
    }

    #[test]
    fn non_progress_lines_yield_nothing() {
        let parser = ProgressParser::new();
        assert!(parser.parse_line("Stream mapping:").is_none());
        assert!(parser
            .parse_line("Output #0, mp4, to '/tmp/out.mp4':")
            .is_none());
        assert!(parser.parse_line("").is_none());
    }

    #[test]
    fn percent_needs_a_total() {
        let without = ProgressParser::new().parse_line(LINE).unwrap();
        assert_eq!(without.percent, 0.0);

        let with = ProgressParser::with_total_duration(65.02).parse_line(LINE).unwrap();
        assert!((with.percent - 50.0).abs() < 0.01);
    }

    #[test]
    fn percent_clamps_at_100() {
        let parser = ProgressParser::with_total_duration(10.0);
        let progress = parser.parse_line(LINE).unwrap();
        assert_eq!(progress.percent, 100.0);
    }

    #[test]
    fn time_parses_hours_minutes_seconds_centis() {
        let line = "frame=1 time=01:02:03.04";
        let progress = ProgressParser::new().parse_line(line).unwrap();
        assert!((progress.time_secs - 3723.04).abs() < 1e-9);
    }

    #[test]
    fn kib_spelling_is_accepted() {
        let line = "frame=10 size=  100KiB time=00:00:01.00";
        let progress = ProgressParser::new().parse_line(line).unwrap();
        assert_eq!(progress.size_kb, 100);
    }
}
