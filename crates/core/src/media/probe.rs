//! Parsing of prober output.

use serde::Deserialize;

use super::types::{AudioStream, ContainerInfo, MediaMetadata, MediaRatio, VideoStream};
use crate::converter::ConverterError;

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    format_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Deserialize, Default)]
struct ProbeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    sample_aspect_ratio: Option<String>,
    display_aspect_ratio: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    bits_per_raw_sample: Option<String>,
    bits_per_sample: Option<u32>,
    color_primaries: Option<String>,
    color_transfer: Option<String>,
    color_space: Option<String>,
    color_range: Option<String>,
    field_order: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    channel_layout: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    disposition: ProbeDisposition,
}

impl ProbeStream {
    fn is(&self, kind: &str) -> bool {
        self.codec_type.as_deref() == Some(kind)
    }

    fn to_video(&self) -> VideoStream {
        let interlaced = matches!(
            self.field_order.as_deref(),
            Some("tt") | Some("bb") | Some("tb") | Some("bt")
        );

        VideoStream {
            codec: self.codec_name.clone().unwrap_or_default(),
            width: self.width.unwrap_or(0),
            height: self.height.unwrap_or(0),
            pixel_aspect: self.sample_aspect_ratio.as_deref().and_then(MediaRatio::parse),
            display_aspect: self.display_aspect_ratio.as_deref().and_then(MediaRatio::parse),
            frame_rate: self
                .r_frame_rate
                .as_deref()
                .and_then(MediaRatio::parse)
                .or_else(|| self.avg_frame_rate.as_deref().and_then(MediaRatio::parse)),
            bit_depth: self
                .bits_per_raw_sample
                .as_deref()
                .and_then(|b| b.parse::<u32>().ok()),
            color_primaries: known(&self.color_primaries),
            color_transfer: known(&self.color_transfer),
            color_space: known(&self.color_space),
            color_range: known(&self.color_range),
            interlaced,
        }
    }

    fn to_audio(&self) -> AudioStream {
        AudioStream {
            codec: self.codec_name.clone().unwrap_or_default(),
            sample_rate: self.sample_rate.as_deref().and_then(|r| r.parse::<u32>().ok()),
            channels: self.channels,
            channel_layout: self.channel_layout.clone(),
            bit_depth: self.bits_per_sample.filter(|b| *b > 0),
            bit_rate: self.bit_rate.as_deref().and_then(|b| b.parse::<u64>().ok()),
        }
    }
}

fn known(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|v| !v.is_empty() && *v != "unknown")
        .map(str::to_string)
}

/// Parses prober JSON (`-show_format -show_streams`) into [`MediaMetadata`].
///
/// Missing blocks are tolerated: no format block gives a zero duration and no
/// audio streams is a valid result. Attached pictures (cover art) are not
/// treated as the video stream.
pub fn parse_probe_output(output: &str) -> Result<MediaMetadata, ConverterError> {
    let probe: ProbeOutput =
        serde_json::from_str(output).map_err(|e| ConverterError::ParseError {
            reason: format!("Failed to parse ffprobe output: {}", e),
        })?;

    let format = probe
        .format
        .map(|f| ContainerInfo {
            format_name: f
                .format_name
                .as_deref()
                .and_then(|n| n.split(',').next())
                .unwrap_or("unknown")
                .to_string(),
            duration_secs: f
                .duration
                .as_deref()
                .and_then(|d| d.parse::<f64>().ok())
                .filter(|d| d.is_finite() && *d > 0.0)
                .unwrap_or(0.0),
            bit_rate: f.bit_rate.as_deref().and_then(|b| b.parse::<u64>().ok()),
        })
        .unwrap_or_default();

    let video = probe
        .streams
        .iter()
        .find(|s| s.is("video") && s.disposition.attached_pic == 0)
        .map(ProbeStream::to_video);

    let audio = probe
        .streams
        .iter()
        .filter(|s| s.is("audio"))
        .map(ProbeStream::to_audio)
        .collect();

    Ok(MediaMetadata {
        format,
        video,
        audio,
    })
}

/// Parses the output of a duration-only probe (a bare number of seconds).
pub fn parse_duration_output(output: &str) -> Option<f64> {
    output
        .lines()
        .map(str::trim)
        .find_map(|l| l.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}
