//! Encoder argument construction.

use chrono::NaiveDate;

use super::config::ConverterConfig;
use super::types::TranscodeJob;

/// Comment metadata for an output file.
///
/// With the date tag the comment is prefixed by the conversion date (or is
/// just the date when empty). Without it the user comment is used alone, and
/// an empty comment produces no metadata.
pub fn synthesize_comment(comment: &str, include_date_tag: bool, today: NaiveDate) -> Option<String> {
    let comment = comment.trim();
    if include_date_tag {
        let date = today.format("%Y-%m-%d").to_string();
        if comment.is_empty() {
            Some(date)
        } else {
            Some(format!("{} {}", date, comment))
        }
    } else if comment.is_empty() {
        None
    } else {
        Some(comment.to_string())
    }
}

fn format_secs(secs: f64) -> String {
    format!("{:.3}", secs)
}

/// Builds the full argument list for one job.
///
/// Order: global flags, fast seek, input, waveform mapping, preset arguments,
/// comment metadata, trim duration, output.
pub fn build_args(config: &ConverterConfig, job: &TranscodeJob, today: NaiveDate) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-y".to_string(),
        "-loglevel".to_string(),
        config.ffmpeg_log_level.clone(),
        "-stats".to_string(),
    ];
    args.extend(config.extra_ffmpeg_args.iter().cloned());

    // Seek before the input so the demuxer jumps instead of decoding.
    let trim_start = job.trim_start.filter(|s| s.is_finite() && *s > 0.0);
    if let Some(start) = trim_start {
        args.extend(["-ss".to_string(), format_secs(start)]);
    }

    match &job.input_args {
        Some(input_args) => args.extend(input_args.iter().cloned()),
        None => args.extend([
            "-i".to_string(),
            job.input_path.to_string_lossy().to_string(),
        ]),
    }

    if let Some(waveform) = &job.waveform {
        args.extend(waveform.to_ffmpeg_args());
    }

    args.extend(job.preset.args.iter().cloned());

    if let Some(comment) = synthesize_comment(&job.comment, job.include_date_tag, today) {
        args.extend(["-metadata".to_string(), format!("comment={}", comment)]);
    }

    if let Some(end) = job.trim_end.filter(|e| e.is_finite()) {
        let length = end - trim_start.unwrap_or(0.0);
        if length > 0.0 {
            args.extend(["-t".to_string(), format_secs(length)]);
        }
    }

    args.push(job.output_path.to_string_lossy().to_string());

    args
}
