use serde::{Deserialize, Serialize};

use crate::converter::{ConverterConfig, WaveformConfig};
use crate::orchestrator::OrchestratorConfig;
use crate::preset::{ExportPreset, PresetError};

/// Root configuration. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub converter: ConverterConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Persisted waveform-rendering preferences.
    #[serde(default)]
    pub waveform: WaveformConfig,

    #[serde(default)]
    pub presets: PresetsConfig,
}

impl Config {
    /// Built-in presets followed by the user's custom presets.
    pub fn preset_catalogue(&self) -> Result<Vec<ExportPreset>, PresetError> {
        let mut presets = ExportPreset::builtin();
        presets.extend(self.presets.build()?);
        Ok(presets)
    }

    /// Looks a preset up by id in the full catalogue.
    pub fn find_preset(&self, id: &str) -> Result<Option<ExportPreset>, PresetError> {
        Ok(self.preset_catalogue()?.into_iter().find(|p| p.id == id))
    }
}

/// User-defined presets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresetsConfig {
    #[serde(default)]
    pub custom: Vec<CustomPresetConfig>,
}

impl PresetsConfig {
    pub fn build(&self) -> Result<Vec<ExportPreset>, PresetError> {
        self.custom.iter().map(CustomPresetConfig::build).collect()
    }
}

/// One custom preset slot; `args` is free text split like a shell would.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomPresetConfig {
    pub id: String,
    pub name: String,
    pub args: String,
    #[serde(default)]
    pub suffix: String,
    pub extension: String,
}

impl CustomPresetConfig {
    pub fn build(&self) -> Result<ExportPreset, PresetError> {
        ExportPreset::custom(
            self.id.clone(),
            self.name.clone(),
            &self.args,
            self.suffix.clone(),
            &self.extension,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_catalogue_includes_custom() {
        let config = Config {
            presets: PresetsConfig {
                custom: vec![CustomPresetConfig {
                    id: "tiny".to_string(),
                    name: "Tiny".to_string(),
                    args: "-c:v libx264 -crf 35".to_string(),
                    suffix: "_tiny".to_string(),
                    extension: "mp4".to_string(),
                }],
            },
            ..Default::default()
        };

        let catalogue = config.preset_catalogue().unwrap();
        assert_eq!(catalogue.len(), ExportPreset::builtin().len() + 1);
        let tiny = config.find_preset("tiny").unwrap().unwrap();
        assert_eq!(tiny.args, vec!["-c:v", "libx264", "-crf", "35"]);
        assert!(config.find_preset("missing").unwrap().is_none());
    }
}
