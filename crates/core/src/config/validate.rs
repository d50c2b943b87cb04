use std::collections::HashSet;

use super::{types::Config, ConfigError};
use crate::preset::ExportPreset;

/// Validate configuration
/// Currently validates:
/// - Progress tick and probe timeout are not 0
/// - Encoder and prober paths are not empty
/// - Custom preset arguments parse and ids are unique
/// - Waveform dimensions are positive and even
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.orchestrator.progress_tick_ms == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.progress_tick_ms cannot be 0".to_string(),
        ));
    }

    // Converter validation
    if config.converter.probe_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "converter.probe_timeout_secs cannot be 0".to_string(),
        ));
    }
    if config.converter.ffmpeg_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "converter.ffmpeg_path cannot be empty".to_string(),
        ));
    }
    if config.converter.ffprobe_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "converter.ffprobe_path cannot be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for preset in &config.presets.custom {
        preset.build().map_err(|e| {
            ConfigError::ValidationError(format!("presets.custom[{}]: {}", preset.id, e))
        })?;
        if ExportPreset::find_builtin(&preset.id).is_some() {
            return Err(ConfigError::ValidationError(format!(
                "presets.custom[{}]: id is taken by a built-in preset",
                preset.id
            )));
        }
        if !seen.insert(preset.id.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "presets.custom[{}]: duplicate id",
                preset.id
            )));
        }
    }

    let waveform = &config.waveform;
    if waveform.width == 0 || waveform.height == 0 {
        return Err(ConfigError::ValidationError(
            "waveform dimensions must be positive".to_string(),
        ));
    }
    // yuv420p needs even dimensions.
    if waveform.width % 2 != 0 || waveform.height % 2 != 0 {
        return Err(ConfigError::ValidationError(format!(
            "waveform dimensions must be even, got {}x{}",
            waveform.width, waveform.height
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CustomPresetConfig, PresetsConfig};
    use std::path::PathBuf;

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_tick_zero_fails() {
        let mut config = Config::default();
        config.orchestrator.progress_tick_ms = 0;
        let result = validate_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_empty_ffmpeg_path_fails() {
        let mut config = Config::default();
        config.converter.ffmpeg_path = PathBuf::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_bad_custom_preset_fails() {
        let config = Config {
            presets: PresetsConfig {
                custom: vec![CustomPresetConfig {
                    id: "broken".to_string(),
                    name: "Broken".to_string(),
                    args: "-vf \"scale=640:-2".to_string(),
                    suffix: String::new(),
                    extension: "mp4".to_string(),
                }],
            },
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("presets.custom[broken]"));
    }

    fn custom(id: &str) -> CustomPresetConfig {
        CustomPresetConfig {
            id: id.to_string(),
            name: id.to_uppercase(),
            args: "-c:v libx264 -crf 30".to_string(),
            suffix: format!("_{}", id),
            extension: "mp4".to_string(),
        }
    }

    #[test]
    fn test_validate_custom_preset_ids() {
        let mut config = Config::default();
        config.presets.custom = vec![custom("small"), custom("tiny")];
        assert!(validate_config(&config).is_ok());

        config.presets.custom = vec![custom("small"), custom("small")];
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate id"));

        config.presets.custom = vec![custom("h264")];
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("built-in"));
    }

    #[test]
    fn test_validate_odd_waveform_fails() {
        let mut config = Config::default();
        config.waveform.height = 721;
        assert!(validate_config(&config).is_err());
    }
}
