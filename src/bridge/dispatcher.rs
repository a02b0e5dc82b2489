//! The controlling task
//!
//! The dispatcher owns the state machine and both controllers. Surface calls
//! and engine notifications arrive on two single-consumer channels and are
//! handled strictly one at a time, so no state is ever touched from an
//! engine thread and every outbound invocation is issued from here.

use tokio::sync::{mpsc, oneshot, watch};

use super::{Command, ContentSurface, SurfaceCallback, VoiceSnapshot};
use crate::config::VoiceConfig;
use crate::voice::{
    EngineNotice, Language, Navigator, RecognitionController, RecognitionEvent,
    RecognitionRequest, SynthesisController, Transition, UtterancePhase, VoiceState,
    VoiceStateMachine,
};

pub(super) struct Dispatcher {
    machine: VoiceStateMachine,
    recognition: RecognitionController,
    synthesis: SynthesisController,
    navigator: Box<dyn Navigator>,
    surface: Box<dyn ContentSurface>,
    config: VoiceConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    notices: mpsc::UnboundedReceiver<EngineNotice>,
    snapshot: watch::Sender<VoiceSnapshot>,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        recognition: RecognitionController,
        synthesis: SynthesisController,
        navigator: Box<dyn Navigator>,
        surface: Box<dyn ContentSurface>,
        config: VoiceConfig,
        commands: mpsc::UnboundedReceiver<Command>,
        notices: mpsc::UnboundedReceiver<EngineNotice>,
        snapshot: watch::Sender<VoiceSnapshot>,
    ) -> Self {
        Self {
            machine: VoiceStateMachine::new(),
            recognition,
            synthesis,
            navigator,
            surface,
            config,
            commands,
            notices,
            snapshot,
        }
    }

    /// Serve until shut down or every handle is dropped
    pub(super) async fn run(mut self) {
        tracing::debug!("voice dispatcher running");

        let done = loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("all bridge handles dropped");
                        break None;
                    };
                    if let Some(done) = self.handle_command(command).await {
                        break Some(done);
                    }
                }
                Some(notice) = self.notices.recv() => {
                    self.handle_notice(notice).await;
                }
            }
            self.publish();
        };

        self.commands.close();
        self.recognition.shutdown(&mut self.machine);
        self.synthesis.shutdown(&mut self.machine);
        self.recover();
        self.publish();
        tracing::info!("voice dispatcher stopped");

        if let Some(done) = done {
            let _ = done.send(());
        }
    }

    /// Handle one surface call; returns the shutdown acknowledgement if the
    /// call was a shutdown
    async fn handle_command(&mut self, command: Command) -> Option<oneshot::Sender<()>> {
        match command {
            Command::Speak {
                text,
                language,
                rate,
                pitch,
            } => self.speak(text, &language, rate, pitch).await,
            Command::StartListening { language } => self.start_listening(&language).await,
            Command::StopListening => {
                if !self.recognition.stop() {
                    tracing::debug!("stop ignored, not listening");
                }
            }
            Command::SetSpeechRate(rate) => {
                let applied = self.synthesis.set_rate(rate);
                tracing::debug!(requested = rate, applied, "speech rate set");
            }
            Command::SetPitch(pitch) => {
                let applied = self.synthesis.set_pitch(pitch);
                tracing::debug!(requested = pitch, applied, "pitch set");
            }
            Command::GetVoiceName { language, reply } => {
                let name = self.synthesis.voice_name(&language);
                let _ = reply.send(name);
            }
            Command::OpenTtsSettings => {
                if let Err(e) = self.navigator.open_tts_settings() {
                    tracing::warn!(error = %e, "failed to open tts settings");
                }
            }
            Command::OpenBrowser(url) => self.open_browser(&url),
            Command::Shutdown { done } => return Some(done),
        }
        None
    }

    async fn speak(&mut self, text: String, language: &str, rate: f32, pitch: f32) {
        let result = language.parse::<Language>().and_then(|language| {
            self.synthesis
                .speak(&mut self.machine, text, language, rate, pitch)
        });

        if let Err(kind) = result {
            tracing::debug!(language, kind = kind.as_str(), "speak rejected");
            self.fail(SurfaceCallback::TtsError(kind)).await;
        }
    }

    async fn start_listening(&mut self, language: &str) {
        let result = language
            .parse::<Language>()
            .map(|language| self.request(language))
            .and_then(|request| self.recognition.start(&mut self.machine, request));

        match result {
            Ok(session) => {
                tracing::debug!(%session, "recognition session accepted");
                self.publish();
                self.emit_recognition(RecognitionEvent::Started).await;
            }
            Err(kind) => {
                tracing::debug!(language, kind = kind.as_str(), "start listening rejected");
                self.fail(SurfaceCallback::SpeechError(kind)).await;
            }
        }
    }

    fn request(&self, language: Language) -> RecognitionRequest {
        RecognitionRequest {
            language,
            max_results: self.config.max_results,
            partial_results: self.config.partial_results,
            prompt: self.config.prompt.clone(),
        }
    }

    fn open_browser(&mut self, raw: &str) {
        let url = match url::Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(url) => {
                tracing::warn!(scheme = url.scheme(), "refusing to open non-web url");
                return;
            }
            Err(e) => {
                tracing::warn!(url = raw, error = %e, "invalid browser url");
                return;
            }
        };

        if let Err(e) = self.navigator.open_browser(&url) {
            tracing::warn!(%url, error = %e, "failed to open browser");
        }
    }

    async fn handle_notice(&mut self, notice: EngineNotice) {
        match notice {
            EngineNotice::Recognition { session, notice } => {
                if let Some(event) = self.recognition.handle(&mut self.machine, session, notice) {
                    self.emit_recognition(event).await;
                }
            }
            EngineNotice::Utterance { utterance, notice } => {
                if let Some(event) = self.synthesis.handle(&mut self.machine, utterance, notice) {
                    let callback = SurfaceCallback::from_utterance(event.phase);
                    if matches!(event.phase, UtterancePhase::Failed(_)) {
                        self.fail(callback).await;
                    } else {
                        self.deliver(&callback).await;
                    }
                }
            }
        }
    }

    async fn emit_recognition(&mut self, event: RecognitionEvent) {
        if let Some(result) = event.result() {
            tracing::debug!(text = %result.text, is_final = result.is_final, "transcript");
        }
        if event.is_terminal() {
            tracing::debug!(state = ?self.machine.state(), "recognition session finished");
        }

        let failed = matches!(event, RecognitionEvent::Error(_));
        let Some(callback) = SurfaceCallback::from_recognition(event) else {
            return;
        };

        if failed {
            self.fail(callback).await;
        } else {
            self.deliver(&callback).await;
        }
    }

    /// Report an error callback, then leave `Error`
    async fn fail(&mut self, callback: SurfaceCallback) {
        self.publish();
        self.deliver(&callback).await;
        self.recover();
    }

    fn recover(&mut self) {
        if self.machine.state() == VoiceState::Error
            && let Err(e) = self.machine.apply(Transition::Recover)
        {
            tracing::error!(error = %e, "failed to recover voice state");
        }
    }

    async fn deliver(&mut self, callback: &SurfaceCallback) {
        let script = callback.render();
        tracing::trace!(%script, "surface invocation");

        if let Err(e) = self.surface.invoke(&script).await {
            tracing::warn!(callback = callback.function(), error = %e, "surface invocation failed");
        }
    }

    fn publish(&self) {
        let current = VoiceSnapshot {
            state: self.machine.state(),
            microphone_held: self.recognition.microphone_held(),
            session: self.recognition.active_session(),
            utterance: self.synthesis.active_utterance(),
        };

        self.snapshot.send_if_modified(|snapshot| {
            if *snapshot == current {
                false
            } else {
                *snapshot = current;
                true
            }
        });
    }
}
