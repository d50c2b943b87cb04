//! Encoder stderr parsing.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").expect("duration pattern is valid")
});

static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"time=\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").expect("time pattern is valid")
});

static SPEED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"speed=\s*(\d+(?:\.\d+)?)x").expect("speed pattern is valid"));

/// One progress reading.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSample {
    /// Fraction of the total duration encoded, in `[0, 1]`.
    pub fraction: f64,
    /// Encoded position in seconds.
    pub position_secs: f64,
    /// Estimated time remaining, when the encoder reports its speed.
    pub eta: Option<String>,
}

fn hms_to_secs(caps: &regex_lite::Captures<'_>) -> Option<f64> {
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Extracts the input duration from the encoder's banner
/// (`Duration: 00:01:30.50, start: ...`).
pub fn parse_duration(text: &str) -> Option<f64> {
    DURATION_RE
        .captures(text)
        .and_then(|caps| hms_to_secs(&caps))
        .filter(|d| *d > 0.0)
}

/// Extracts the latest progress reading from a chunk of encoder output.
///
/// Returns `None` until a total duration is known, either passed in or found
/// in the same text. A chunk may hold several `\r`-separated status lines;
/// the last one wins.
pub fn parse_progress(text: &str, total_duration_secs: Option<f64>) -> Option<ProgressSample> {
    let total = total_duration_secs
        .filter(|d| d.is_finite() && *d > 0.0)
        .or_else(|| parse_duration(text))?;

    let position = TIME_RE
        .captures_iter(text)
        .filter_map(|caps| hms_to_secs(&caps))
        .last()?;

    let speed = SPEED_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
        .last()
        .filter(|s| *s > 0.0);

    let eta = speed.map(|s| format_eta(((total - position).max(0.0)) / s));

    Some(ProgressSample {
        fraction: (position / total).clamp(0.0, 1.0),
        position_secs: position,
        eta,
    })
}

/// Formats a remaining time as `M:SS`, or `H:MM:SS` from one hour up.
pub fn format_eta(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.round() as u64
    } else {
        0
    };
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANNER: &str = "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'in.mov':\n  \
        Duration: 00:02:00.00, start: 0.000000, bitrate: 5000 kb/s\n";

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration(BANNER), Some(120.0));
        assert_eq!(parse_duration("  Duration: 01:00:01.50, start"), Some(3601.5));
        assert_eq!(parse_duration("  Duration: N/A, bitrate: N/A"), None);
        assert_eq!(parse_duration("frame=1"), None);
    }

    #[test]
    fn test_progress_requires_duration() {
        let line = "frame=  100 fps= 30 q=28.0 size=1024kB time=00:00:30.00 bitrate=800kbits/s speed=2.0x";
        assert!(parse_progress(line, None).is_none());

        let sample = parse_progress(line, Some(120.0)).unwrap();
        assert!((sample.fraction - 0.25).abs() < 1e-9);
        assert_eq!(sample.position_secs, 30.0);
        // 90s of media left at 2x
        assert_eq!(sample.eta.as_deref(), Some("0:45"));
    }

    #[test]
    fn test_progress_discovers_duration_in_same_text() {
        let text = format!("{}frame=10 time=00:01:00.00 bitrate=1k", BANNER);
        let sample = parse_progress(&text, None).unwrap();
        assert!((sample.fraction - 0.5).abs() < 1e-9);
        assert!(sample.eta.is_none());
    }

    #[test]
    fn test_progress_last_reading_wins_and_clamps() {
        let text = "time=00:00:10.00 speed=1.0x\rtime=00:00:20.00 speed=4.0x\r";
        let sample = parse_progress(text, Some(40.0)).unwrap();
        assert!((sample.fraction - 0.5).abs() < 1e-9);
        assert_eq!(sample.eta.as_deref(), Some("0:05"));

        let over = parse_progress("time=00:00:50.00", Some(40.0)).unwrap();
        assert_eq!(over.fraction, 1.0);
    }

    #[test]
    fn test_progress_ignores_unknown_time() {
        assert!(parse_progress("time=N/A bitrate=N/A", Some(10.0)).is_none());
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(5.4), "0:05");
        assert_eq!(format_eta(125.0), "2:05");
        assert_eq!(format_eta(3723.0), "1:02:03");
        assert_eq!(format_eta(f64::NAN), "0:00");
    }
}
