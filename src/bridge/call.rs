//! Inbound calls from the content surface

use serde::{Deserialize, Serialize};

use crate::voice::{DEFAULT_PITCH, DEFAULT_RATE};

/// One call from the content surface, as it crosses the wire
///
/// ```json
/// {"method": "speak", "text": "Hola", "language": "es", "rate": 1.0}
/// {"method": "startListening", "language": "en"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum BridgeCall {
    /// Speak text, flushing anything in flight
    Speak {
        text: String,
        language: String,
        #[serde(default = "default_rate")]
        rate: f32,
        #[serde(default = "default_pitch")]
        pitch: f32,
    },
    /// Begin a recognition session
    StartListening { language: String },
    /// Stop the active recognition session
    StopListening,
    /// Change the speech rate
    SetSpeechRate { rate: f32 },
    /// Change the pitch
    SetPitch { pitch: f32 },
    /// Query the voice used for a language
    GetVoiceName { language: String },
    /// Open the platform TTS settings
    OpenTtsSettings,
    /// Open a web page in the platform browser
    OpenBrowser { url: String },
}

const fn default_rate() -> f32 {
    DEFAULT_RATE
}

const fn default_pitch() -> f32 {
    DEFAULT_PITCH
}

impl BridgeCall {
    /// Wire name of the call
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Speak { .. } => "speak",
            Self::StartListening { .. } => "startListening",
            Self::StopListening => "stopListening",
            Self::SetSpeechRate { .. } => "setSpeechRate",
            Self::SetPitch { .. } => "setPitch",
            Self::GetVoiceName { .. } => "getVoiceName",
            Self::OpenTtsSettings => "openTtsSettings",
            Self::OpenBrowser { .. } => "openBrowser",
        }
    }
}
