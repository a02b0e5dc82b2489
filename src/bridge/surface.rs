//! Outbound invocations toward the content surface
//!
//! Every callback is rendered as one self-contained invocation such as
//! `onSpeechResult("don\u0027t")`. String arguments are JSON string literals
//! with `'`, U+2028 and U+2029 escaped as well, so the invocation stays
//! well-formed whether the host injects it into a script, an attribute or a
//! `javascript:` URL, and the surface can decode every argument exactly.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::voice::{ErrorKind, RecognitionEvent, UtterancePhase};
use crate::{Error, Result};

/// Rendered content surface that executes injected invocations
#[async_trait]
pub trait ContentSurface: Send + Sync {
    /// Execute one rendered invocation
    ///
    /// # Errors
    ///
    /// Returns error if the surface could not run the invocation
    async fn invoke(&self, script: &str) -> Result<()>;
}

/// Callback toward the content surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCallback {
    /// Utterance audio started
    TtsStart,
    /// Utterance finished
    TtsEnd,
    /// Synthesis failed
    TtsError(ErrorKind),
    /// Recognition session accepted
    SpeechStarted,
    /// Advisory partial transcript
    SpeechPartial(String),
    /// Final transcript
    SpeechResult(String),
    /// Recognition failed
    SpeechError(ErrorKind),
}

impl SurfaceCallback {
    /// Callback for a recognition event; `Ended` has no callback
    #[must_use]
    pub fn from_recognition(event: RecognitionEvent) -> Option<Self> {
        match event {
            RecognitionEvent::Started => Some(Self::SpeechStarted),
            RecognitionEvent::PartialResult(text) => Some(Self::SpeechPartial(text)),
            RecognitionEvent::FinalResult(text) => Some(Self::SpeechResult(text)),
            RecognitionEvent::Error(kind) => Some(Self::SpeechError(kind)),
            RecognitionEvent::Ended => None,
        }
    }

    /// Callback for an utterance phase
    #[must_use]
    pub const fn from_utterance(phase: UtterancePhase) -> Self {
        match phase {
            UtterancePhase::Started => Self::TtsStart,
            UtterancePhase::Completed => Self::TtsEnd,
            UtterancePhase::Failed(kind) => Self::TtsError(kind),
        }
    }

    /// Name of the surface function
    #[must_use]
    pub const fn function(&self) -> &'static str {
        match self {
            Self::TtsStart => "onTtsStart",
            Self::TtsEnd => "onTtsEnd",
            Self::TtsError(_) => "onTtsError",
            Self::SpeechStarted => "onSpeechStarted",
            Self::SpeechPartial(_) => "onSpeechPartial",
            Self::SpeechResult(_) => "onSpeechResult",
            Self::SpeechError(_) => "onSpeechError",
        }
    }

    /// Render as one invocation
    #[must_use]
    pub fn render(&self) -> String {
        let args = match self {
            Self::TtsStart | Self::TtsEnd | Self::SpeechStarted => Vec::new(),
            Self::SpeechPartial(text) | Self::SpeechResult(text) => vec![string_literal(text)],
            Self::TtsError(kind) | Self::SpeechError(kind) => vec![
                string_literal(&kind.to_string()),
                string_literal(kind.as_str()),
            ],
        };

        format!("{}({})", self.function(), args.join(", "))
    }
}

/// Render `value` as an escaped string literal
#[must_use]
pub fn string_literal(value: &str) -> String {
    let json = serde_json::Value::String(value.to_string()).to_string();

    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '\'' => out.push_str("\\u0027"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}

/// Surface that forwards every invocation into a channel
///
/// Used by hosts that run the real surface elsewhere (another thread, a
/// pipe) and by tests.
#[derive(Debug, Clone)]
pub struct ChannelSurface {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSurface {
    /// Create a surface and the receiver of its invocations
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ContentSurface for ChannelSurface {
    async fn invoke(&self, script: &str) -> Result<()> {
        self.tx
            .send(script.to_string())
            .map_err(|_| Error::Surface("invocation receiver dropped".to_string()))
    }
}
