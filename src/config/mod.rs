//! Configuration management for the voice bridge
//!
//! Values resolve env > toml > default.

pub mod file;

use std::path::Path;

use crate::voice::{DEFAULT_PITCH, DEFAULT_RATE, Language, clamp_pitch, clamp_rate};
use crate::{Error, Result};

use file::VocabVoiceConfigFile;

/// Prompt shown by the recognizer unless configured otherwise
pub const DEFAULT_PROMPT: &str = "Say the phrase in English";

/// Hypotheses requested per recognition session unless configured otherwise
pub const DEFAULT_MAX_RESULTS: u8 = 5;

/// Voice bridge configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// Voice configuration
    pub voice: VoiceConfig,
}

/// Voice configuration
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConfig {
    /// Language used when a caller doesn't name one
    pub language: Language,

    /// Initial speech rate, clamped into `[0.1, 2.0]`
    pub speech_rate: f32,

    /// Initial pitch, clamped into `[0.1, 2.0]`
    pub pitch: f32,

    /// Recognition hypotheses requested per session
    pub max_results: u8,

    /// Forward partial transcripts as `onSpeechPartial`
    pub partial_results: bool,

    /// Prompt shown by the recognizer
    pub prompt: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            speech_rate: DEFAULT_RATE,
            pitch: DEFAULT_PITCH,
            max_results: DEFAULT_MAX_RESULTS,
            partial_results: false,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default config file and the environment
    ///
    /// # Errors
    ///
    /// Returns error if the configured language is not supported
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Load configuration from an explicit config file and the environment
    ///
    /// Unlike [`Config::load`], a file named by the caller must exist and
    /// parse.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or the configured
    /// language is not supported
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let fc: VocabVoiceConfigFile = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");

        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if the configured language is not supported
    pub fn from_sources(
        fc: VocabVoiceConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let fv = fc.voice;

        let language = match env("VOCAB_VOICE_LANGUAGE").or(fv.language) {
            Some(code) => code
                .parse::<Language>()
                .map_err(|_| Error::Config(format!("unsupported language: {code}")))?,
            None => Language::default(),
        };

        let speech_rate = parse_env(&env, "VOCAB_VOICE_RATE")
            .or(fv.speech_rate)
            .map_or(DEFAULT_RATE, clamp_rate);
        let pitch = parse_env(&env, "VOCAB_VOICE_PITCH")
            .or(fv.pitch)
            .map_or(DEFAULT_PITCH, clamp_pitch);

        let max_results = parse_env(&env, "VOCAB_VOICE_MAX_RESULTS")
            .or(fv.max_results)
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .max(1);

        let voice = VoiceConfig {
            language,
            speech_rate,
            pitch,
            max_results,
            partial_results: parse_env(&env, "VOCAB_VOICE_PARTIAL_RESULTS")
                .or(fv.partial_results)
                .unwrap_or(false),
            prompt: env("VOCAB_VOICE_PROMPT")
                .or(fv.prompt)
                .unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
        };

        tracing::debug!(
            language = %voice.language,
            rate = voice.speech_rate,
            pitch = voice.pitch,
            "configuration resolved"
        );

        Ok(Self { voice })
    }
}

/// Parse an env override, ignoring values that don't parse
fn parse_env<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    raw.trim().parse().map_or_else(
        |_| {
            tracing::warn!(key, value = %raw, "ignoring unparseable env override");
            None
        },
        Some,
    )
}
