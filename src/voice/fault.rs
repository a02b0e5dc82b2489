//! Voice error taxonomy
//!
//! Engines report [`EngineFault`]s; the controllers map every fault into an
//! [`ErrorKind`] before anything reaches the content surface.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error identifier surfaced to the content surface
///
/// `Display` yields the human-readable message, [`ErrorKind::as_str`] the
/// identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Platform has no usable engine
    #[error("Speech engine unavailable")]
    EngineUnavailable,

    /// Another voice operation owns the bridge
    #[error("Voice channel busy")]
    AlreadyBusy,

    /// Microphone permission was not granted
    #[error("Insufficient permissions")]
    PermissionDenied,

    /// Engine has no voice data for the language
    #[error("Language not supported")]
    LanguageUnsupported,

    /// Network failure
    #[error("Network error")]
    NetworkError,

    /// Network operation timed out
    #[error("Network timeout")]
    NetworkTimeout,

    /// Nothing recognized
    #[error("No match")]
    NoMatch,

    /// Recognition service busy
    #[error("Recognizer busy")]
    RecognizerBusy,

    /// Server-side failure
    #[error("Server error")]
    ServerError,

    /// No speech input before the engine gave up
    #[error("No speech input")]
    SpeechTimeout,

    /// Audio recording failure
    #[error("Audio recording error")]
    AudioError,

    /// Client-side failure
    #[error("Client side error")]
    ClientError,

    /// Anything the taxonomy does not name
    #[error("Unknown error")]
    Unknown,
}

impl ErrorKind {
    /// Stable snake_case identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EngineUnavailable => "engine_unavailable",
            Self::AlreadyBusy => "already_busy",
            Self::PermissionDenied => "permission_denied",
            Self::LanguageUnsupported => "language_unsupported",
            Self::NetworkError => "network_error",
            Self::NetworkTimeout => "network_timeout",
            Self::NoMatch => "no_match",
            Self::RecognizerBusy => "recognizer_busy",
            Self::ServerError => "server_error",
            Self::SpeechTimeout => "speech_timeout",
            Self::AudioError => "audio_error",
            Self::ClientError => "client_error",
            Self::Unknown => "unknown",
        }
    }
}

/// Failure reported by a recognition or synthesis engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineFault {
    /// Audio recording failed
    #[error("audio recording error")]
    Audio,

    /// Network failure
    #[error("network error")]
    Network,

    /// Network operation timed out
    #[error("network timeout")]
    NetworkTimeout,

    /// No recognition result matched
    #[error("no match")]
    NoMatch,

    /// Engine busy with another client
    #[error("recognizer busy")]
    Busy,

    /// Server sent an error status
    #[error("server error")]
    Server,

    /// Engine lacks the permissions it needs
    #[error("insufficient permissions")]
    InsufficientPermissions,

    /// No speech input
    #[error("speech timeout")]
    SpeechTimeout,

    /// Other client-side error
    #[error("client error")]
    Client,

    /// Raw platform error code that has no named variant
    #[error("engine error code {0}")]
    Code(i32),

    /// Free-form failure
    #[error("{0}")]
    Other(String),
}

impl EngineFault {
    /// Map a platform recognizer error code
    ///
    /// Codes follow the common recognizer numbering (1 network timeout
    /// through 9 insufficient permissions); anything else is kept raw.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            1 => Self::NetworkTimeout,
            2 => Self::Network,
            3 => Self::Audio,
            4 => Self::Server,
            5 => Self::Client,
            6 => Self::SpeechTimeout,
            7 => Self::NoMatch,
            8 => Self::Busy,
            9 => Self::InsufficientPermissions,
            other => Self::Code(other),
        }
    }
}

impl From<&EngineFault> for ErrorKind {
    fn from(fault: &EngineFault) -> Self {
        match fault {
            EngineFault::Audio => Self::AudioError,
            EngineFault::Network => Self::NetworkError,
            EngineFault::NetworkTimeout => Self::NetworkTimeout,
            EngineFault::NoMatch => Self::NoMatch,
            EngineFault::Busy => Self::RecognizerBusy,
            EngineFault::Server => Self::ServerError,
            EngineFault::InsufficientPermissions => Self::PermissionDenied,
            EngineFault::SpeechTimeout => Self::SpeechTimeout,
            EngineFault::Client => Self::ClientError,
            EngineFault::Code(_) | EngineFault::Other(_) => Self::Unknown,
        }
    }
}

impl From<EngineFault> for ErrorKind {
    fn from(fault: EngineFault) -> Self {
        Self::from(&fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_codes_map_to_taxonomy() {
        let expected = [
            (1, ErrorKind::NetworkTimeout),
            (2, ErrorKind::NetworkError),
            (3, ErrorKind::AudioError),
            (4, ErrorKind::ServerError),
            (5, ErrorKind::ClientError),
            (6, ErrorKind::SpeechTimeout),
            (7, ErrorKind::NoMatch),
            (8, ErrorKind::RecognizerBusy),
            (9, ErrorKind::PermissionDenied),
        ];

        for (code, kind) in expected {
            assert_eq!(ErrorKind::from(EngineFault::from_code(code)), kind, "code {code}");
        }
    }

    #[test]
    fn test_unmapped_faults_are_unknown() {
        assert_eq!(EngineFault::from_code(42), EngineFault::Code(42));
        assert_eq!(ErrorKind::from(EngineFault::Code(42)), ErrorKind::Unknown);
        assert_eq!(
            ErrorKind::from(EngineFault::Other("binder died".to_string())),
            ErrorKind::Unknown
        );
    }

    #[test]
    fn test_message_and_identifier() {
        assert_eq!(ErrorKind::NoMatch.to_string(), "No match");
        assert_eq!(ErrorKind::NoMatch.as_str(), "no_match");
        assert_eq!(
            serde_json::to_string(&ErrorKind::LanguageUnsupported).unwrap(),
            "\"language_unsupported\""
        );
    }
}
