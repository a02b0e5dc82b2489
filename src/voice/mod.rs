//! Voice processing module
//!
//! Controllers for the platform recognizer and synthesizer, the state
//! machine that keeps them from overlapping, and the engine seams they drive.
//! The dispatcher in [`crate::bridge`] is the only caller.

mod engine;
mod fault;
mod language;
mod recognition;
pub mod simulated;
mod state;
mod synthesis;

pub use engine::{
    AlwaysGranted, CatalogError, EngineNotice, LanguageStatus, LoggingNavigator,
    MicrophonePermission, Navigator, PermissionStatus, RecognitionEngine, RecognitionNotice,
    RecognitionRequest, RecognitionResult, RecognitionSink, SessionId, SynthesisEngine,
    SynthesisRequest, UnavailableRecognizer, UnavailableSynthesizer, UtteranceId,
    UtteranceNotice, UtteranceSink, VoiceInfo,
};
pub use fault::{EngineFault, ErrorKind};
pub use language::Language;
pub use recognition::{RecognitionController, RecognitionEvent};
pub use state::{InvalidTransition, Transition, VoiceState, VoiceStateMachine};
pub use synthesis::{
    DEFAULT_PITCH, DEFAULT_RATE, LANGUAGE_NOT_SUPPORTED, MAX_RATE, MIN_RATE,
    SynthesisController, UtteranceEvent, UtterancePhase, clamp_pitch, clamp_rate,
};
