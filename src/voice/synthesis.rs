//! Synthesis controller
//!
//! Wraps the platform text-to-speech engine. A new utterance always flushes
//! the one in flight; the flushed utterance's id stops being active, so any
//! notification it still produces is dropped as stale.

use tokio::sync::mpsc;

use super::{
    CatalogError, EngineFault, EngineNotice, ErrorKind, Language, SynthesisEngine,
    SynthesisRequest, Transition, UtteranceId, UtteranceNotice, UtteranceSink, VoiceInfo,
    VoiceState, VoiceStateMachine,
};

/// Slowest accepted speech rate
pub const MIN_RATE: f32 = 0.1;

/// Fastest accepted speech rate
pub const MAX_RATE: f32 = 2.0;

/// Rate used when none (or NaN) is given
pub const DEFAULT_RATE: f32 = 1.0;

/// Pitch used when none (or NaN) is given
pub const DEFAULT_PITCH: f32 = 1.0;

/// `getVoiceName` answer for languages without voice data
pub const LANGUAGE_NOT_SUPPORTED: &str = "Language Not Supported";

/// Clamp a speech rate into `[MIN_RATE, MAX_RATE]`
#[must_use]
pub fn clamp_rate(rate: f32) -> f32 {
    if rate.is_nan() {
        DEFAULT_RATE
    } else {
        rate.clamp(MIN_RATE, MAX_RATE)
    }
}

/// Clamp a pitch into the same range as the rate
#[must_use]
pub fn clamp_pitch(pitch: f32) -> f32 {
    if pitch.is_nan() {
        DEFAULT_PITCH
    } else {
        pitch.clamp(MIN_RATE, MAX_RATE)
    }
}

/// Phase of an utterance lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtterancePhase {
    /// Audio output started
    Started,
    /// Spoken to the end; terminal
    Completed,
    /// Failed; terminal
    Failed(ErrorKind),
}

/// Utterance lifecycle event, after correlation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtteranceEvent {
    /// Utterance the event belongs to
    pub utterance: UtteranceId,
    /// Lifecycle phase
    pub phase: UtterancePhase,
}

/// Owns the synthesizer and the single active utterance
pub struct SynthesisController {
    engine: Box<dyn SynthesisEngine>,
    notices: mpsc::UnboundedSender<EngineNotice>,
    rate: f32,
    pitch: f32,
    active: Option<UtteranceId>,
}

impl SynthesisController {
    /// Create a controller and push the initial rate and pitch to the engine
    #[must_use]
    pub fn new(
        mut engine: Box<dyn SynthesisEngine>,
        notices: mpsc::UnboundedSender<EngineNotice>,
        rate: f32,
        pitch: f32,
    ) -> Self {
        let rate = clamp_rate(rate);
        let pitch = clamp_pitch(pitch);
        engine.set_rate(rate);
        engine.set_pitch(pitch);

        Self {
            engine,
            notices,
            rate,
            pitch,
            active: None,
        }
    }

    /// Speak `text`, flushing any utterance in flight
    ///
    /// # Errors
    ///
    /// - `AlreadyBusy` if a recognition session owns the bridge
    /// - `LanguageUnsupported` if the engine has no voice data for `language`;
    ///   nothing is flushed and the state is unchanged
    /// - the mapped engine fault if the engine rejects the utterance
    pub fn speak(
        &mut self,
        machine: &mut VoiceStateMachine,
        text: String,
        language: Language,
        rate: f32,
        pitch: f32,
    ) -> Result<UtteranceId, ErrorKind> {
        if matches!(machine.state(), VoiceState::Listening | VoiceState::Error) {
            return Err(ErrorKind::AlreadyBusy);
        }

        let locale = language.locale();
        let status = self.engine.language_status(locale);
        if !status.is_available() {
            tracing::debug!(locale, ?status, "no voice data");
            return Err(ErrorKind::LanguageUnsupported);
        }

        if let Some(previous) = self.active.take() {
            tracing::debug!(utterance = %previous, "flushing utterance");
            self.engine.stop();
        }

        if let Err(fault) = self.engine.set_language(locale) {
            return Err(Self::fail_start(machine, &fault));
        }
        self.rate = clamp_rate(rate);
        self.pitch = clamp_pitch(pitch);
        self.engine.set_rate(self.rate);
        self.engine.set_pitch(self.pitch);

        let utterance = UtteranceId::new();
        let request = SynthesisRequest {
            text,
            language,
            rate: self.rate,
            pitch: self.pitch,
            utterance,
        };
        let sink = UtteranceSink::new(utterance, self.notices.clone());
        if let Err(fault) = self.engine.speak(&request, sink) {
            return Err(Self::fail_start(machine, &fault));
        }

        if let Err(e) = machine.apply(Transition::BeginSpeaking) {
            tracing::error!(%utterance, error = %e, "speaking rejected after engine accepted");
            self.engine.stop();
            return Err(ErrorKind::Unknown);
        }

        tracing::info!(%utterance, %language, rate = self.rate, "speaking");
        self.active = Some(utterance);
        Ok(utterance)
    }

    /// Set the speech rate, clamped; returns the value the engine received
    pub fn set_rate(&mut self, rate: f32) -> f32 {
        self.rate = clamp_rate(rate);
        self.engine.set_rate(self.rate);
        self.rate
    }

    /// Set the pitch, clamped; returns the value the engine received
    pub fn set_pitch(&mut self, pitch: f32) -> f32 {
        self.pitch = clamp_pitch(pitch);
        self.engine.set_pitch(self.pitch);
        self.pitch
    }

    /// Resolve the voice the engine would use for `language`
    ///
    /// Answers `"<voice> | <locale>"`, [`LANGUAGE_NOT_SUPPORTED`], or
    /// `"Error: <fault>"`. The catalog is queried without touching the active
    /// language. Engines without a catalog are queried by switching language;
    /// the previous language is restored before returning. If the engine had
    /// no language selected, the queried one stays selected, which is harmless
    /// because every `speak` selects its own language.
    pub fn voice_name(&mut self, language: &str) -> String {
        let Ok(language) = language.parse::<Language>() else {
            return LANGUAGE_NOT_SUPPORTED.to_string();
        };
        let locale = language.locale();

        if !self.engine.language_status(locale).is_available() {
            return LANGUAGE_NOT_SUPPORTED.to_string();
        }

        match self.engine.voice_for(locale) {
            Ok(Some(voice)) => format_voice(&voice),
            Ok(None) => LANGUAGE_NOT_SUPPORTED.to_string(),
            Err(CatalogError::Engine(fault)) => {
                tracing::warn!(locale, error = %fault, "voice lookup failed");
                format!("Error: {fault}")
            }
            Err(CatalogError::Unavailable) => self.voice_by_switching(locale),
        }
    }

    fn voice_by_switching(&mut self, locale: &str) -> String {
        let previous = self.engine.active_locale();
        tracing::debug!(locale, ?previous, "looking up voice by switching language");

        if let Err(fault) = self.engine.set_language(locale) {
            return format!("Error: {fault}");
        }
        let answer = self
            .engine
            .active_voice()
            .map_or_else(|| LANGUAGE_NOT_SUPPORTED.to_string(), |v| format_voice(&v));

        if let Some(previous) = previous.filter(|p| p != locale)
            && let Err(fault) = self.engine.set_language(&previous)
        {
            tracing::warn!(locale = %previous, error = %fault, "failed to restore language after voice lookup");
        }

        answer
    }

    /// Correlate an engine notification with the active utterance
    ///
    /// Notifications for flushed or finished utterances are dropped.
    pub fn handle(
        &mut self,
        machine: &mut VoiceStateMachine,
        utterance: UtteranceId,
        notice: UtteranceNotice,
    ) -> Option<UtteranceEvent> {
        if self.active != Some(utterance) {
            tracing::debug!(%utterance, ?notice, "dropping stale utterance notice");
            return None;
        }

        let phase = match notice {
            UtteranceNotice::Started => UtterancePhase::Started,
            UtteranceNotice::Completed => {
                self.finish(machine, Transition::EndSpeaking);
                UtterancePhase::Completed
            }
            UtteranceNotice::Failed(fault) => {
                let kind = ErrorKind::from(&fault);
                tracing::warn!(%utterance, error = %fault, kind = kind.as_str(), "utterance failed");
                self.finish(machine, Transition::Fault);
                UtterancePhase::Failed(kind)
            }
        };

        Some(UtteranceEvent { utterance, phase })
    }

    /// Stop the active utterance without waiting for the engine
    pub fn shutdown(&mut self, machine: &mut VoiceStateMachine) {
        if self.active.is_some() {
            self.engine.stop();
            self.finish(machine, Transition::EndSpeaking);
        }
    }

    /// Id of the utterance in flight
    #[must_use]
    pub const fn active_utterance(&self) -> Option<UtteranceId> {
        self.active
    }

    /// Current speech rate
    #[must_use]
    pub const fn rate(&self) -> f32 {
        self.rate
    }

    /// Current pitch
    #[must_use]
    pub const fn pitch(&self) -> f32 {
        self.pitch
    }

    fn finish(&mut self, machine: &mut VoiceStateMachine, transition: Transition) {
        self.active = None;
        if let Err(e) = machine.apply(transition) {
            tracing::error!(error = %e, "utterance ended outside speaking");
        }
    }

    fn fail_start(machine: &mut VoiceStateMachine, fault: &EngineFault) -> ErrorKind {
        tracing::warn!(error = %fault, "synthesizer rejected utterance");
        // a flush already discarded the previous utterance
        if machine.state() == VoiceState::Speaking
            && let Err(e) = machine.apply(Transition::Fault)
        {
            tracing::error!(error = %e, "failed to record synthesis fault");
        }
        ErrorKind::from(fault)
    }
}

fn format_voice(voice: &VoiceInfo) -> String {
    format!("{} | {}", voice.name, voice.locale)
}
