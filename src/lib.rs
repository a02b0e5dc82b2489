//! Vocab Voice - speech bridge for a vocabulary practice surface
//!
//! This library provides the voice half of the vocabulary app:
//! - Speaking a phrase in English or Spanish (text-to-speech)
//! - Listening for a spoken answer (speech recognition)
//! - A state machine that keeps the two from overlapping
//! - The bridge that turns surface calls into engine work and engine
//!   notifications into surface callbacks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Content Surface                    │
//! │   speak  │  startListening  │  getVoiceName  │ ...  │
//! └───────────▲────────────┬────────────────────────────┘
//!  onTtsEnd() │            │ BridgeCall
//! ┌───────────┴────────────▼────────────────────────────┐
//! │                    VoiceBridge                      │
//! │   Dispatcher  │  VoiceStateMachine  │  Snapshot     │
//! └───────────▲────────────┬────────────────────────────┘
//!  EngineNotice            │
//! ┌───────────┴────────────▼────────────────────────────┐
//! │    RecognitionController  │  SynthesisController    │
//! │    RecognitionEngine      │  SynthesisEngine        │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod voice;

pub use bridge::{BridgeCall, ChannelSurface, ContentSurface, VoiceBridge, VoiceSnapshot};
pub use config::{Config, VoiceConfig};
pub use error::{Error, Result};
pub use voice::{ErrorKind, Language, VoiceState};
