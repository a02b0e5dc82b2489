//! Platform engine seams
//!
//! Platform recognizers and synthesizers deliver their callbacks on threads
//! they own. Instead of registering listener objects, engines receive a sink
//! tagged with the session or utterance they belong to. Every sink feeds the
//! same single-consumer channel read by the dispatcher, so notifications are
//! re-marshaled onto the controlling task before they touch any state.

use std::fmt;

use tokio::sync::mpsc;
use uuid::Uuid;

use super::{EngineFault, Language};

/// Correlation id of one recognition session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Create a session id from its sequence number
    #[must_use]
    pub const fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    /// Sequence number of the session
    #[must_use]
    pub const fn sequence(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Correlation id of one synthesized utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId(Uuid);

impl UtteranceId {
    /// Fresh random utterance id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UtteranceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Parameters of one listening session
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionRequest {
    /// Language to recognize
    pub language: Language,
    /// Maximum number of alternatives the engine should return
    pub max_results: u8,
    /// Whether partial hypotheses should be forwarded to the surface
    pub partial_results: bool,
    /// Prompt shown by engines that render their own UI
    pub prompt: String,
}

/// Recognized text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    /// Best hypothesis
    pub text: String,
    /// False for advisory partial hypotheses
    pub is_final: bool,
}

/// Parameters of one utterance
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    /// Text to speak
    pub text: String,
    /// Language of the text
    pub language: Language,
    /// Speech rate, already clamped
    pub rate: f32,
    /// Pitch, already clamped
    pub pitch: f32,
    /// Correlation id the engine must report back through its sink
    pub utterance: UtteranceId,
}

/// Raw recognizer notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionNotice {
    /// Engine is ready for speech
    ReadyForSpeech,
    /// Partial hypotheses, best first
    Partial(Vec<String>),
    /// Final hypotheses, best first
    Results(Vec<String>),
    /// Session failed
    Error(EngineFault),
    /// Session ended after a stop request without producing results
    Stopped,
}

/// Raw synthesizer notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceNotice {
    /// Audio output started
    Started,
    /// Utterance spoken to the end
    Completed,
    /// Utterance failed
    Failed(EngineFault),
}

/// Notification re-marshaled onto the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineNotice {
    /// From the recognizer
    Recognition {
        /// Session the notification belongs to
        session: SessionId,
        /// Notification payload
        notice: RecognitionNotice,
    },
    /// From the synthesizer
    Utterance {
        /// Utterance the notification belongs to
        utterance: UtteranceId,
        /// Notification payload
        notice: UtteranceNotice,
    },
}

/// Sender half handed to a recognizer for one session
///
/// Cheap to clone and safe to use from any thread.
#[derive(Debug, Clone)]
pub struct RecognitionSink {
    session: SessionId,
    tx: mpsc::UnboundedSender<EngineNotice>,
}

impl RecognitionSink {
    pub(crate) const fn new(session: SessionId, tx: mpsc::UnboundedSender<EngineNotice>) -> Self {
        Self { session, tx }
    }

    /// Session this sink reports for
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Deliver a notification
    ///
    /// Returns false once the dispatcher is gone.
    pub fn notify(&self, notice: RecognitionNotice) -> bool {
        self.tx
            .send(EngineNotice::Recognition {
                session: self.session,
                notice,
            })
            .is_ok()
    }
}

/// Sender half handed to a synthesizer for one utterance
#[derive(Debug, Clone)]
pub struct UtteranceSink {
    utterance: UtteranceId,
    tx: mpsc::UnboundedSender<EngineNotice>,
}

impl UtteranceSink {
    pub(crate) const fn new(utterance: UtteranceId, tx: mpsc::UnboundedSender<EngineNotice>) -> Self {
        Self { utterance, tx }
    }

    /// Utterance this sink reports for
    #[must_use]
    pub const fn utterance(&self) -> UtteranceId {
        self.utterance
    }

    /// Deliver a notification
    ///
    /// Returns false once the dispatcher is gone.
    pub fn notify(&self, notice: UtteranceNotice) -> bool {
        self.tx
            .send(EngineNotice::Utterance {
                utterance: self.utterance,
                notice,
            })
            .is_ok()
    }
}

/// Platform speech recognizer
///
/// Calls are made from the dispatcher task and must not block on audio I/O.
pub trait RecognitionEngine: Send {
    /// Whether recognition is supported on this platform
    fn is_available(&self) -> bool;

    /// Begin a session; results arrive through `sink`
    ///
    /// # Errors
    ///
    /// Returns the fault if the engine refuses to start
    fn start(&mut self, request: &RecognitionRequest, sink: RecognitionSink) -> Result<(), EngineFault>;

    /// Ask the active session to finish early; the engine should still
    /// report `Results`, `Error` or `Stopped`
    fn stop(&mut self);

    /// Abort the active session without further notifications
    fn cancel(&mut self);
}

/// Voice data availability for a locale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageStatus {
    /// Voice data installed
    Available,
    /// Language known but voice data missing
    MissingData,
    /// Language not supported at all
    NotSupported,
}

impl LanguageStatus {
    /// Check if the engine can speak the language right now
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Available)
    }
}

/// A voice from the synthesizer's catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    /// Engine-specific voice name
    pub name: String,
    /// Locale tag the voice speaks
    pub locale: String,
}

/// Why a voice catalog lookup failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Engine cannot enumerate voices without switching language
    Unavailable,
    /// Lookup failed
    Engine(EngineFault),
}

/// Platform text-to-speech engine
pub trait SynthesisEngine: Send {
    /// Voice data availability for `locale`
    fn language_status(&self, locale: &str) -> LanguageStatus;

    /// Voice the engine would use for `locale`, without changing the active language
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Unavailable` when the engine has no catalog API
    fn voice_for(&self, locale: &str) -> Result<Option<VoiceInfo>, CatalogError>;

    /// Voice currently selected
    fn active_voice(&self) -> Option<VoiceInfo>;

    /// Locale currently selected
    fn active_locale(&self) -> Option<String>;

    /// Select the synthesis language
    ///
    /// # Errors
    ///
    /// Returns the fault if the engine rejects the locale
    fn set_language(&mut self, locale: &str) -> Result<(), EngineFault>;

    /// Apply a speech rate (already clamped)
    fn set_rate(&mut self, rate: f32);

    /// Apply a pitch (already clamped)
    fn set_pitch(&mut self, pitch: f32);

    /// Speak, discarding anything queued or playing
    ///
    /// # Errors
    ///
    /// Returns the fault if the utterance could not be queued
    fn speak(&mut self, request: &SynthesisRequest, sink: UtteranceSink) -> Result<(), EngineFault>;

    /// Stop playback and drop queued utterances
    fn stop(&mut self);
}

/// Microphone permission status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    /// Recording allowed
    Granted,
    /// Recording denied
    Denied,
}

/// Source of the microphone permission
///
/// The bridge only checks it; requesting the permission is the host's job.
pub trait MicrophonePermission: Send {
    /// Current status
    fn status(&self) -> PermissionStatus;
}

/// Permission source for hosts without a permission model
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysGranted;

impl MicrophonePermission for AlwaysGranted {
    fn status(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }
}

/// Fire-and-forget platform navigation
pub trait Navigator: Send {
    /// Open the platform text-to-speech settings
    ///
    /// # Errors
    ///
    /// Returns the fault if the platform cannot open the settings
    fn open_tts_settings(&mut self) -> Result<(), EngineFault>;

    /// Open `url` in the platform browser
    ///
    /// # Errors
    ///
    /// Returns the fault if no browser handled the URL
    fn open_browser(&mut self, url: &url::Url) -> Result<(), EngineFault>;
}

/// Navigator for hosts without navigation; requests are only logged
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn open_tts_settings(&mut self) -> Result<(), EngineFault> {
        tracing::info!("tts settings requested");
        Ok(())
    }

    fn open_browser(&mut self, url: &url::Url) -> Result<(), EngineFault> {
        tracing::info!(%url, "browser requested");
        Ok(())
    }
}

/// Recognizer for platforms without speech recognition
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRecognizer;

impl RecognitionEngine for UnavailableRecognizer {
    fn is_available(&self) -> bool {
        false
    }

    fn start(&mut self, _request: &RecognitionRequest, _sink: RecognitionSink) -> Result<(), EngineFault> {
        Err(EngineFault::Other("speech recognition unavailable".to_string()))
    }

    fn stop(&mut self) {}

    fn cancel(&mut self) {}
}

/// Synthesizer for platforms without text-to-speech; knows no language
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableSynthesizer;

impl SynthesisEngine for UnavailableSynthesizer {
    fn language_status(&self, _locale: &str) -> LanguageStatus {
        LanguageStatus::NotSupported
    }

    fn voice_for(&self, _locale: &str) -> Result<Option<VoiceInfo>, CatalogError> {
        Ok(None)
    }

    fn active_voice(&self) -> Option<VoiceInfo> {
        None
    }

    fn active_locale(&self) -> Option<String> {
        None
    }

    fn set_language(&mut self, locale: &str) -> Result<(), EngineFault> {
        Err(EngineFault::Other(format!("no voice for {locale}")))
    }

    fn set_rate(&mut self, _rate: f32) {}

    fn set_pitch(&mut self, _pitch: f32) {}

    fn speak(&mut self, _request: &SynthesisRequest, _sink: UtteranceSink) -> Result<(), EngineFault> {
        Err(EngineFault::Other("text-to-speech unavailable".to_string()))
    }

    fn stop(&mut self) {}
}
