//! Export presets: named argument templates for the encoder.
//!
//! Built-in presets are fixed. Custom presets are parsed from the free text a
//! user types into a settings field, with shell-like quoting.

mod args;
mod types;

pub use args::split_arguments;
pub use types::{sanitize_base_name, ExportPreset, PresetError, PresetKind};
