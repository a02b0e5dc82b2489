//! Voice bridge between the content surface and the speech engines
//!
//! [`VoiceBridge`] is the handle every call site holds. Calls on it never
//! block: they are queued onto the dispatcher task, which validates them
//! against the voice state, drives the controllers, and answers through
//! invocations on the [`ContentSurface`].
//!
//! ```text
//!  content surface ──calls──▶ VoiceBridge ──Command──▶ ┌────────────┐
//!                                                      │ Dispatcher │──▶ ContentSurface
//!  engine threads ──sinks──▶ EngineNotice ───────────▶ └────────────┘
//! ```

mod call;
mod dispatcher;
mod surface;

use tokio::sync::{mpsc, oneshot, watch};

pub use call::BridgeCall;
pub use surface::{ChannelSurface, ContentSurface, SurfaceCallback, string_literal};

use crate::config::VoiceConfig;
use crate::voice::{
    AlwaysGranted, LoggingNavigator, MicrophonePermission, Navigator, RecognitionController,
    RecognitionEngine, SessionId, SynthesisController, SynthesisEngine, UnavailableRecognizer,
    UnavailableSynthesizer, UtteranceId, VoiceState,
};
use crate::{Error, Result};
use dispatcher::Dispatcher;

/// Observable bridge state, published after every handled message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoiceSnapshot {
    /// Authoritative voice state
    pub state: VoiceState,
    /// Whether the recognition controller holds the microphone
    pub microphone_held: bool,
    /// Active recognition session
    pub session: Option<SessionId>,
    /// Utterance in flight
    pub utterance: Option<UtteranceId>,
}

/// Message queued onto the dispatcher
#[derive(Debug)]
enum Command {
    Speak {
        text: String,
        language: String,
        rate: f32,
        pitch: f32,
    },
    StartListening {
        language: String,
    },
    StopListening,
    SetSpeechRate(f32),
    SetPitch(f32),
    GetVoiceName {
        language: String,
        reply: oneshot::Sender<String>,
    },
    OpenTtsSettings,
    OpenBrowser(String),
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Handle to a running voice bridge
///
/// Cheap to clone; the dispatcher stops when the last handle is dropped or
/// [`VoiceBridge::shutdown`] is called.
#[derive(Debug, Clone)]
pub struct VoiceBridge {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<VoiceSnapshot>,
}

impl VoiceBridge {
    /// Start building a bridge
    #[must_use]
    pub fn builder(config: VoiceConfig) -> VoiceBridgeBuilder {
        VoiceBridgeBuilder::new(config)
    }

    /// Speak `text`; answered by `onTtsStart()` then `onTtsEnd()`, or `onTtsError`
    ///
    /// # Errors
    ///
    /// Returns error if the bridge is closed
    pub fn speak(
        &self,
        text: impl Into<String>,
        language: impl Into<String>,
        rate: f32,
        pitch: f32,
    ) -> Result<()> {
        self.send(Command::Speak {
            text: text.into(),
            language: language.into(),
            rate,
            pitch,
        })
    }

    /// Begin listening; answered by `onSpeechStarted()` then
    /// `onSpeechResult` or `onSpeechError`
    ///
    /// # Errors
    ///
    /// Returns error if the bridge is closed
    pub fn start_listening(&self, language: impl Into<String>) -> Result<()> {
        self.send(Command::StartListening {
            language: language.into(),
        })
    }

    /// Ask the active session to stop; no-op if not listening
    ///
    /// # Errors
    ///
    /// Returns error if the bridge is closed
    pub fn stop_listening(&self) -> Result<()> {
        self.send(Command::StopListening)
    }

    /// Set the speech rate; clamped into `[0.1, 2.0]`
    ///
    /// # Errors
    ///
    /// Returns error if the bridge is closed
    pub fn set_speech_rate(&self, rate: f32) -> Result<()> {
        self.send(Command::SetSpeechRate(rate))
    }

    /// Set the pitch; clamped into `[0.1, 2.0]`
    ///
    /// # Errors
    ///
    /// Returns error if the bridge is closed
    pub fn set_pitch(&self, pitch: f32) -> Result<()> {
        self.send(Command::SetPitch(pitch))
    }

    /// Resolve the voice used for `language`
    ///
    /// # Errors
    ///
    /// Returns error if the bridge is closed
    pub async fn get_voice_name(&self, language: impl Into<String>) -> Result<String> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::GetVoiceName {
            language: language.into(),
            reply,
        })?;
        rx.await.map_err(|_| Error::BridgeClosed)
    }

    /// Blocking variant of [`VoiceBridge::get_voice_name`] for synchronous
    /// host threads; must not be called from within the async runtime
    ///
    /// # Errors
    ///
    /// Returns error if the bridge is closed
    pub fn get_voice_name_blocking(&self, language: impl Into<String>) -> Result<String> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::GetVoiceName {
            language: language.into(),
            reply,
        })?;
        rx.blocking_recv().map_err(|_| Error::BridgeClosed)
    }

    /// Open the platform TTS settings
    ///
    /// # Errors
    ///
    /// Returns error if the bridge is closed
    pub fn open_tts_settings(&self) -> Result<()> {
        self.send(Command::OpenTtsSettings)
    }

    /// Open `url` in the platform browser; only `http`/`https` URLs are opened
    ///
    /// # Errors
    ///
    /// Returns error if the bridge is closed
    pub fn open_browser(&self, url: impl Into<String>) -> Result<()> {
        self.send(Command::OpenBrowser(url.into()))
    }

    /// Forward a wire call; returns the answer of `getVoiceName`
    ///
    /// # Errors
    ///
    /// Returns error if the bridge is closed
    pub async fn call(&self, call: BridgeCall) -> Result<Option<String>> {
        tracing::trace!(method = call.method(), "bridge call");
        match call {
            BridgeCall::Speak {
                text,
                language,
                rate,
                pitch,
            } => self.speak(text, language, rate, pitch)?,
            BridgeCall::StartListening { language } => self.start_listening(language)?,
            BridgeCall::StopListening => self.stop_listening()?,
            BridgeCall::SetSpeechRate { rate } => self.set_speech_rate(rate)?,
            BridgeCall::SetPitch { pitch } => self.set_pitch(pitch)?,
            BridgeCall::GetVoiceName { language } => {
                return self.get_voice_name(language).await.map(Some);
            }
            BridgeCall::OpenTtsSettings => self.open_tts_settings()?,
            BridgeCall::OpenBrowser { url } => self.open_browser(url)?,
        }
        Ok(None)
    }

    /// Latest published state
    #[must_use]
    pub fn snapshot(&self) -> VoiceSnapshot {
        *self.snapshot.borrow()
    }

    /// Receiver of every published state change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<VoiceSnapshot> {
        self.snapshot.clone()
    }

    /// Stop both engines, release the microphone and end the dispatcher
    ///
    /// # Errors
    ///
    /// Returns error if the bridge was already closed
    pub async fn shutdown(&self) -> Result<()> {
        let (done, rx) = oneshot::channel();
        self.send(Command::Shutdown { done })?;
        rx.await.map_err(|_| Error::BridgeClosed)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::BridgeClosed)
    }
}

/// Builder for [`VoiceBridge`]
///
/// Engines default to unavailable ones, so a bridge without a recognizer
/// answers every `startListening` with `engine_unavailable`.
pub struct VoiceBridgeBuilder {
    config: VoiceConfig,
    recognizer: Box<dyn RecognitionEngine>,
    synthesizer: Box<dyn SynthesisEngine>,
    permission: Box<dyn MicrophonePermission>,
    navigator: Box<dyn Navigator>,
}

impl VoiceBridgeBuilder {
    /// Create a builder with unavailable engines
    #[must_use]
    pub fn new(config: VoiceConfig) -> Self {
        Self {
            config,
            recognizer: Box::new(UnavailableRecognizer),
            synthesizer: Box::new(UnavailableSynthesizer),
            permission: Box::new(AlwaysGranted),
            navigator: Box::new(LoggingNavigator),
        }
    }

    /// Set the speech recognizer
    #[must_use]
    pub fn recognizer(mut self, engine: impl RecognitionEngine + 'static) -> Self {
        self.recognizer = Box::new(engine);
        self
    }

    /// Set the text-to-speech engine
    #[must_use]
    pub fn synthesizer(mut self, engine: impl SynthesisEngine + 'static) -> Self {
        self.synthesizer = Box::new(engine);
        self
    }

    /// Set the microphone permission source
    #[must_use]
    pub fn permission(mut self, permission: impl MicrophonePermission + 'static) -> Self {
        self.permission = Box::new(permission);
        self
    }

    /// Set the platform navigator
    #[must_use]
    pub fn navigator(mut self, navigator: impl Navigator + 'static) -> Self {
        self.navigator = Box::new(navigator);
        self
    }

    /// Spawn the dispatcher on the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime
    #[must_use]
    pub fn spawn(self, surface: impl ContentSurface + 'static) -> VoiceBridge {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(VoiceSnapshot::default());

        let recognition =
            RecognitionController::new(self.recognizer, self.permission, notices_tx.clone());
        let synthesis = SynthesisController::new(
            self.synthesizer,
            notices_tx,
            self.config.speech_rate,
            self.config.pitch,
        );

        tracing::debug!(
            language = %self.config.language,
            rate = synthesis.rate(),
            pitch = synthesis.pitch(),
            "voice bridge starting"
        );

        let dispatcher = Dispatcher::new(
            recognition,
            synthesis,
            self.navigator,
            Box::new(surface),
            self.config,
            commands_rx,
            notices_rx,
            snapshot_tx,
        );
        tokio::spawn(dispatcher.run());

        VoiceBridge {
            commands: commands_tx,
            snapshot: snapshot_rx,
        }
    }
}
