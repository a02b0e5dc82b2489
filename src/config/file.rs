//! TOML configuration file loading
//!
//! Supports `~/.config/vocab-voice/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VocabVoiceConfigFile {
    /// Voice bridge configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,
}

/// Voice bridge configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Default language code (e.g. "en")
    pub language: Option<String>,

    /// Speech rate multiplier
    pub speech_rate: Option<f32>,

    /// Pitch multiplier
    pub pitch: Option<f32>,

    /// Recognition hypotheses requested per session
    pub max_results: Option<u8>,

    /// Forward partial transcripts
    pub partial_results: Option<bool>,

    /// Prompt shown while listening
    pub prompt: Option<String>,
}

/// Load the config file from the default location
///
/// Returns defaults if the file doesn't exist or fails to parse.
#[must_use]
pub fn load_config_file() -> VocabVoiceConfigFile {
    config_file_path().map_or_else(VocabVoiceConfigFile::default, |path| {
        load_config_file_from(&path)
    })
}

/// Load a config file from `path`, falling back to defaults
#[must_use]
pub fn load_config_file_from(path: &Path) -> VocabVoiceConfigFile {
    if !path.exists() {
        return VocabVoiceConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VocabVoiceConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VocabVoiceConfigFile::default()
        }
    }
}

/// Path to the config file (`~/.config/vocab-voice/config.toml` on Linux)
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("vocab-voice").join("config.toml"))
}
