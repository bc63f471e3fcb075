//! Previewer settings, stored as RON.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("could not encode config: {0}")]
    Encode(#[from] ron::Error),
}

/// User-tunable settings. Every field is optional in the file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Directory holding the kit's WAV files
    pub kit_dir: Option<PathBuf>,
    /// Per-pitch file name overrides of the General-MIDI kit map
    pub samples: BTreeMap<u8, String>,
    /// Native tempo for files that name none
    pub default_tempo: f64,
    pub loop_playback: bool,
    pub render_sample_rate: u32,
    pub max_render_seconds: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            kit_dir: None,
            samples: BTreeMap::new(),
            default_tempo: dv_ir::DEFAULT_TEMPO_BPM,
            loop_playback: false,
            render_sample_rate: 44100,
            max_render_seconds: 300,
        }
    }
}

impl PreviewConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_ron(&text)
    }

    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = PreviewConfig::from_ron("(loop_playback: true)").unwrap();
        assert!(config.loop_playback);
        assert_eq!(config.default_tempo, 120.0);
        assert_eq!(config.render_sample_rate, 44100);
    }

    #[test]
    fn sample_overrides_parse() {
        let config = PreviewConfig::from_ron(
            r#"(kit_dir: Some("kits/rock"), samples: {38: "rimshot.wav"}, default_tempo: 96.0)"#,
        )
        .unwrap();
        assert_eq!(config.kit_dir, Some(PathBuf::from("kits/rock")));
        assert_eq!(config.samples.get(&38).map(String::as_str), Some("rimshot.wav"));
        assert_eq!(config.default_tempo, 96.0);
    }

    #[test]
    fn survives_a_save() {
        let mut config = PreviewConfig::default();
        config.samples.insert(42, "tight-hat.wav".into());
        let text = config.to_ron().unwrap();
        assert_eq!(PreviewConfig::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn malformed_text_is_an_error() {
        assert!(matches!(PreviewConfig::from_ron("(loop_playback: "), Err(ConfigError::Parse(_))));
    }
}
