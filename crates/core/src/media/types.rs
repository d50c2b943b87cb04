//! Types describing probed media.

use serde::{Deserialize, Serialize};

/// Tolerance for aspect ratios when exact fractions are unavailable or differ.
pub const RATIO_TOLERANCE: f64 = 0.001;

/// Tolerance for frame rates when exact fractions are unavailable or differ.
pub const FRAME_RATE_TOLERANCE: f64 = 0.01;

/// A ratio or rate as reported by the prober.
///
/// Fractions such as `30000/1001` or `16:9` are kept exact; plain decimal
/// strings such as `29.97` are kept as decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaRatio {
    Exact { num: u64, den: u64 },
    Decimal { value: f64 },
}

impl MediaRatio {
    /// The 1:1 ratio.
    pub const UNITY: MediaRatio = MediaRatio::Exact { num: 1, den: 1 };

    /// Parses `a/b`, `a:b` or a decimal. Zero denominators, zero numerators
    /// (`0:1` means "unknown" to the prober) and `N/A` yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some((num, den)) = s.split_once(['/', ':']) {
            let num = num.trim().parse::<u64>().ok()?;
            let den = den.trim().parse::<u64>().ok()?;
            if num == 0 || den == 0 {
                return None;
            }
            return Some(Self::Exact { num, den });
        }

        let value = s.parse::<f64>().ok()?;
        if value.is_finite() && value > 0.0 {
            Some(Self::Decimal { value })
        } else {
            None
        }
    }

    /// Decimal value of the ratio.
    pub fn to_f64(&self) -> f64 {
        match *self {
            Self::Exact { num, den } => num as f64 / den as f64,
            Self::Decimal { value } => value,
        }
    }

    /// Exact comparison, available only when both sides are fractions.
    pub fn exact_eq(&self, other: &Self) -> Option<bool> {
        match (*self, *other) {
            (Self::Exact { num: a, den: b }, Self::Exact { num: c, den: d }) => {
                Some(a as u128 * d as u128 == c as u128 * b as u128)
            }
            _ => None,
        }
    }

    /// Exact equality first, then decimal comparison within `tolerance`.
    pub fn matches(&self, other: &Self, tolerance: f64) -> bool {
        if self.exact_eq(other) == Some(true) {
            return true;
        }
        (self.to_f64() - other.to_f64()).abs() <= tolerance
    }
}

/// Container-level information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub format_name: String,
    /// Seconds, 0 when unknown.
    pub duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u64>,
}

/// Primary video stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoStream {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    /// Sample (pixel) aspect ratio; `None` when not recorded.
    pub pixel_aspect: Option<MediaRatio>,
    pub display_aspect: Option<MediaRatio>,
    pub frame_rate: Option<MediaRatio>,
    pub bit_depth: Option<u32>,
    pub color_primaries: Option<String>,
    pub color_transfer: Option<String>,
    pub color_space: Option<String>,
    pub color_range: Option<String>,
    pub interlaced: bool,
}

impl VideoStream {
    /// Pixel aspect ratio, treating "not recorded" as square pixels.
    pub fn pixel_aspect_or_unity(&self) -> MediaRatio {
        self.pixel_aspect.unwrap_or(MediaRatio::UNITY)
    }
}

/// One audio stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioStream {
    pub codec: String,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub channel_layout: Option<String>,
    pub bit_depth: Option<u32>,
    pub bit_rate: Option<u64>,
}

/// Everything the prober reports about a file. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub format: ContainerInfo,
    pub video: Option<VideoStream>,
    #[serde(default)]
    pub audio: Vec<AudioStream>,
}

impl MediaMetadata {
    /// First audio stream, if any.
    pub fn primary_audio(&self) -> Option<&AudioStream> {
        self.audio.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fraction_forms() {
        assert_eq!(
            MediaRatio::parse("30000/1001"),
            Some(MediaRatio::Exact { num: 30000, den: 1001 })
        );
        assert_eq!(
            MediaRatio::parse("16:9"),
            Some(MediaRatio::Exact { num: 16, den: 9 })
        );
        assert_eq!(
            MediaRatio::parse("29.97"),
            Some(MediaRatio::Decimal { value: 29.97 })
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(MediaRatio::parse("0/0"), None);
        assert_eq!(MediaRatio::parse("0:1"), None);
        assert_eq!(MediaRatio::parse("25/0"), None);
        assert_eq!(MediaRatio::parse("N/A"), None);
        assert_eq!(MediaRatio::parse(""), None);
    }

    #[test]
    fn test_exact_equality_across_reduced_forms() {
        let a = MediaRatio::Exact { num: 50, den: 2 };
        let b = MediaRatio::Exact { num: 25, den: 1 };
        assert_eq!(a.exact_eq(&b), Some(true));
        assert!(a.matches(&b, 0.0));
    }

    #[test]
    fn test_tolerance_fallback() {
        let exact = MediaRatio::Exact { num: 30000, den: 1001 };
        let decimal = MediaRatio::Decimal { value: 29.97 };
        assert_eq!(exact.exact_eq(&decimal), None);
        assert!(exact.matches(&decimal, FRAME_RATE_TOLERANCE));

        let pal = MediaRatio::Exact { num: 25, den: 1 };
        assert!(!exact.matches(&pal, FRAME_RATE_TOLERANCE));
    }

    #[test]
    fn test_pixel_aspect_defaults_to_unity() {
        let stream = VideoStream::default();
        assert_eq!(stream.pixel_aspect_or_unity(), MediaRatio::UNITY);
    }
}
