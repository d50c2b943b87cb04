use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// Variables look like `CLIPQUEUE_CONVERTER__FFMPEG_PATH`; `__` separates
/// nesting levels so field names keep their underscores.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("CLIPQUEUE_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[converter]
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"

[orchestrator]
progress_tick_ms = 1000
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(
            config.converter.ffmpeg_path,
            PathBuf::from("/opt/ffmpeg/bin/ffmpeg")
        );
        assert_eq!(config.orchestrator.progress_tick_ms, 1000);
        assert_eq!(config.waveform.width, 1280);
    }

    #[test]
    fn test_load_config_from_str_empty() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.orchestrator.progress_tick_ms, 3000);
        assert!(config.presets.custom.is_empty());
    }

    #[test]
    fn test_load_config_from_str_bad_type() {
        let result = load_config_from_str("[orchestrator]\nprogress_tick_ms = \"soon\"\n");
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[orchestrator]
default_output_folder = "/exports"

[[presets.custom]]
id = "small"
name = "Small"
args = "-c:v libx264 -crf 30"
extension = "mp4"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(
            config.orchestrator.default_output_folder,
            Some(PathBuf::from("/exports"))
        );
        assert_eq!(config.presets.custom.len(), 1);
        assert_eq!(config.presets.custom[0].suffix, "");
    }
}
