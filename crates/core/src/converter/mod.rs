//! Converter module: the transcode invoker.
//!
//! This module provides the `Converter` trait and an FFmpeg implementation
//! that runs exactly one encoder process per call, streams its stderr through
//! the progress parser, and can terminate the process on request.
//!
//! # Example
//!
//! ```ignore
//! use clipqueue_core::converter::{Converter, FfmpegConverter, TranscodeJob};
//! use clipqueue_core::preset::ExportPreset;
//!
//! let converter = FfmpegConverter::with_defaults();
//! converter.validate().await?;
//!
//! let job = TranscodeJob::new(
//!     "job-1",
//!     "/videos/in.mov",
//!     "/videos/out/in_h264.mp4",
//!     ExportPreset::find_builtin("h264").unwrap(),
//! )
//! .with_comment("holiday", true);
//!
//! let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//! tokio::spawn(async move {
//!     while let Some(p) = rx.recv().await {
//!         println!("{:?} eta {:?}", p.fraction, p.eta);
//!     }
//! });
//! let result = converter.convert_with_progress(job, tx).await?;
//! ```

mod args;
mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use args::{build_args, synthesize_comment};
pub use config::{ConverterConfig, WaveformConfig};
pub use error::ConverterError;
pub use ffmpeg::FfmpegConverter;
pub use traits::Converter;
pub use types::{TranscodeJob, TranscodeProgress, TranscodeResult, WaveformRequest};
