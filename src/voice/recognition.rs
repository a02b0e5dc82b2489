//! Recognition controller
//!
//! Wraps the platform recognizer. At most one session is active; the session
//! owns the microphone lease, so the microphone is held exactly while the
//! state machine is in `Listening`.

use tokio::sync::mpsc;

use super::{
    EngineNotice, ErrorKind, MicrophonePermission, PermissionStatus, RecognitionEngine,
    RecognitionNotice, RecognitionRequest, RecognitionResult, RecognitionSink, SessionId,
    Transition, VoiceStateMachine,
};

/// Lifecycle event of a recognition session, after correlation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Session accepted and listening
    Started,
    /// Advisory hypothesis
    PartialResult(String),
    /// Final hypothesis; terminal
    FinalResult(String),
    /// Session failed; terminal
    Error(ErrorKind),
    /// Stop completed without a result; terminal
    Ended,
}

impl RecognitionEvent {
    /// Check if the event ends the session
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::FinalResult(_) | Self::Error(_) | Self::Ended)
    }

    /// Transcript carried by the event, if any
    #[must_use]
    pub fn result(&self) -> Option<RecognitionResult> {
        match self {
            Self::PartialResult(text) => Some(RecognitionResult {
                text: text.clone(),
                is_final: false,
            }),
            Self::FinalResult(text) => Some(RecognitionResult {
                text: text.clone(),
                is_final: true,
            }),
            _ => None,
        }
    }
}

/// Exclusive hold on the microphone
#[derive(Debug)]
struct MicrophoneLease {
    session: SessionId,
}

impl MicrophoneLease {
    fn acquire(session: SessionId) -> Self {
        tracing::debug!(%session, "microphone acquired");
        Self { session }
    }
}

impl Drop for MicrophoneLease {
    fn drop(&mut self) {
        tracing::debug!(session = %self.session, "microphone released");
    }
}

#[derive(Debug)]
struct ActiveSession {
    id: SessionId,
    request: RecognitionRequest,
    _microphone: MicrophoneLease,
    stop_requested: bool,
}

/// Owns the recognizer and the single active session
pub struct RecognitionController {
    engine: Box<dyn RecognitionEngine>,
    permission: Box<dyn MicrophonePermission>,
    notices: mpsc::UnboundedSender<EngineNotice>,
    sessions: u64,
    active: Option<ActiveSession>,
}

impl RecognitionController {
    /// Create a controller whose sessions report into `notices`
    #[must_use]
    pub fn new(
        engine: Box<dyn RecognitionEngine>,
        permission: Box<dyn MicrophonePermission>,
        notices: mpsc::UnboundedSender<EngineNotice>,
    ) -> Self {
        Self {
            engine,
            permission,
            notices,
            sessions: 0,
            active: None,
        }
    }

    /// Begin a listening session
    ///
    /// On success the microphone is held and the machine is `Listening`.
    ///
    /// # Errors
    ///
    /// - `EngineUnavailable` if the platform has no recognizer
    /// - `AlreadyBusy` if the machine is not idle
    /// - `PermissionDenied` if microphone access was not granted
    /// - the mapped engine fault if the recognizer refuses to start
    pub fn start(
        &mut self,
        machine: &mut VoiceStateMachine,
        request: RecognitionRequest,
    ) -> Result<SessionId, ErrorKind> {
        if !self.engine.is_available() {
            return Err(ErrorKind::EngineUnavailable);
        }
        if !machine.is_idle() || self.active.is_some() {
            return Err(ErrorKind::AlreadyBusy);
        }
        if self.permission.status() == PermissionStatus::Denied {
            return Err(ErrorKind::PermissionDenied);
        }

        self.sessions += 1;
        let id = SessionId::new(self.sessions);
        let microphone = MicrophoneLease::acquire(id);

        let sink = RecognitionSink::new(id, self.notices.clone());
        if let Err(fault) = self.engine.start(&request, sink) {
            tracing::warn!(session = %id, error = %fault, "recognizer refused to start");
            return Err(ErrorKind::from(&fault));
        }

        if let Err(e) = machine.apply(Transition::BeginListening) {
            tracing::error!(session = %id, error = %e, "listening rejected after engine start");
            self.engine.cancel();
            return Err(ErrorKind::Unknown);
        }

        tracing::info!(session = %id, language = %request.language, "listening");
        self.active = Some(ActiveSession {
            id,
            request,
            _microphone: microphone,
            stop_requested: false,
        });
        Ok(id)
    }

    /// Request early termination of the active session
    ///
    /// Idempotent and non-blocking: the session stays active until the engine
    /// reports its terminal notification. Returns false if nothing was listening.
    pub fn stop(&mut self) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };

        if !active.stop_requested {
            active.stop_requested = true;
            tracing::debug!(session = %active.id, "stop requested");
            self.engine.stop();
        }
        true
    }

    /// Correlate an engine notification with the active session
    ///
    /// Notifications for any other session are stale and dropped. Terminal
    /// notifications release the microphone and move the machine out of
    /// `Listening` (to `Idle`, or to `Error` for failures).
    pub fn handle(
        &mut self,
        machine: &mut VoiceStateMachine,
        session: SessionId,
        notice: RecognitionNotice,
    ) -> Option<RecognitionEvent> {
        let Some(active) = self.active.as_ref().filter(|a| a.id == session) else {
            tracing::debug!(%session, ?notice, "dropping stale recognition notice");
            return None;
        };

        match notice {
            RecognitionNotice::ReadyForSpeech => {
                tracing::debug!(%session, "ready for speech");
                None
            }
            RecognitionNotice::Partial(hypotheses) => {
                if !active.request.partial_results {
                    return None;
                }
                best(hypotheses).map(RecognitionEvent::PartialResult)
            }
            RecognitionNotice::Results(hypotheses) => {
                if let Some(text) = best(hypotheses) {
                    tracing::info!(%session, transcript = %text, "recognized");
                    self.finish(machine, Transition::EndListening);
                    Some(RecognitionEvent::FinalResult(text))
                } else {
                    self.finish(machine, Transition::Fault);
                    Some(RecognitionEvent::Error(ErrorKind::NoMatch))
                }
            }
            RecognitionNotice::Error(fault) => {
                let kind = ErrorKind::from(&fault);
                tracing::warn!(%session, error = %fault, kind = kind.as_str(), "recognition failed");
                self.finish(machine, Transition::Fault);
                Some(RecognitionEvent::Error(kind))
            }
            RecognitionNotice::Stopped => {
                self.finish(machine, Transition::EndListening);
                Some(RecognitionEvent::Ended)
            }
        }
    }

    /// Abort the active session without waiting for the engine
    pub fn shutdown(&mut self, machine: &mut VoiceStateMachine) {
        if self.active.is_some() {
            self.engine.cancel();
            self.finish(machine, Transition::EndListening);
        }
    }

    /// Check if the microphone lease is held
    #[must_use]
    pub const fn microphone_held(&self) -> bool {
        self.active.is_some()
    }

    /// Id of the active session
    #[must_use]
    pub fn active_session(&self) -> Option<SessionId> {
        self.active.as_ref().map(|a| a.id)
    }

    fn finish(&mut self, machine: &mut VoiceStateMachine, transition: Transition) {
        self.active = None;
        if let Err(e) = machine.apply(transition) {
            tracing::error!(error = %e, "recognition session ended outside listening");
        }
    }
}

/// First non-blank hypothesis
fn best(hypotheses: Vec<String>) -> Option<String> {
    hypotheses.into_iter().find(|h| !h.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::voice::{AlwaysGranted, EngineFault, Language, VoiceState};

    #[derive(Default)]
    struct Calls {
        starts: usize,
        stops: usize,
        cancels: usize,
    }

    struct FakeEngine {
        available: bool,
        refuse: Option<EngineFault>,
        calls: Arc<Mutex<Calls>>,
    }

    impl RecognitionEngine for FakeEngine {
        fn is_available(&self) -> bool {
            self.available
        }

        fn start(&mut self, _request: &RecognitionRequest, _sink: RecognitionSink) -> Result<(), EngineFault> {
            self.calls.lock().unwrap().starts += 1;
            self.refuse.clone().map_or(Ok(()), Err)
        }

        fn stop(&mut self) {
            self.calls.lock().unwrap().stops += 1;
        }

        fn cancel(&mut self) {
            self.calls.lock().unwrap().cancels += 1;
        }
    }

    struct Denied;

    impl MicrophonePermission for Denied {
        fn status(&self) -> PermissionStatus {
            PermissionStatus::Denied
        }
    }

    fn controller(available: bool, refuse: Option<EngineFault>) -> (RecognitionController, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let (tx, _rx) = mpsc::unbounded_channel();
        let engine = FakeEngine {
            available,
            refuse,
            calls: Arc::clone(&calls),
        };
        (
            RecognitionController::new(Box::new(engine), Box::new(AlwaysGranted), tx),
            calls,
        )
    }

    fn request(partial_results: bool) -> RecognitionRequest {
        RecognitionRequest {
            language: Language::English,
            max_results: 5,
            partial_results,
            prompt: String::new(),
        }
    }

    #[test]
    fn test_start_holds_microphone() {
        let (mut controller, _) = controller(true, None);
        let mut machine = VoiceStateMachine::new();

        let session = controller.start(&mut machine, request(false)).unwrap();
        assert_eq!(machine.state(), VoiceState::Listening);
        assert!(controller.microphone_held());
        assert_eq!(controller.active_session(), Some(session));
    }

    #[test]
    fn test_start_rejections() {
        let (mut controller, _) = controller(false, None);
        let mut machine = VoiceStateMachine::new();
        assert_eq!(
            controller.start(&mut machine, request(false)),
            Err(ErrorKind::EngineUnavailable)
        );

        let (mut controller, _) = self::controller(true, None);
        controller.start(&mut machine, request(false)).unwrap();
        assert_eq!(
            controller.start(&mut machine, request(false)),
            Err(ErrorKind::AlreadyBusy)
        );

        let (tx, _rx) = mpsc::unbounded_channel();
        let engine = FakeEngine {
            available: true,
            refuse: None,
            calls: Arc::default(),
        };
        let mut denied = RecognitionController::new(Box::new(engine), Box::new(Denied), tx);
        let mut machine = VoiceStateMachine::new();
        assert_eq!(
            denied.start(&mut machine, request(false)),
            Err(ErrorKind::PermissionDenied)
        );
        assert!(!denied.microphone_held());
    }

    #[test]
    fn test_refused_start_releases_microphone() {
        let (mut controller, calls) = controller(true, Some(EngineFault::Busy));
        let mut machine = VoiceStateMachine::new();

        assert_eq!(
            controller.start(&mut machine, request(false)),
            Err(ErrorKind::RecognizerBusy)
        );
        assert_eq!(calls.lock().unwrap().starts, 1);
        assert!(!controller.microphone_held());
        assert!(machine.is_idle());
    }

    #[test]
    fn test_results_end_session() {
        let (mut controller, _) = controller(true, None);
        let mut machine = VoiceStateMachine::new();
        let session = controller.start(&mut machine, request(false)).unwrap();

        let event = controller.handle(
            &mut machine,
            session,
            RecognitionNotice::Results(vec![" ".to_string(), "don't".to_string()]),
        );
        assert_eq!(event, Some(RecognitionEvent::FinalResult("don't".to_string())));
        assert!(machine.is_idle());
        assert!(!controller.microphone_held());
    }

    #[test]
    fn test_empty_results_are_no_match() {
        let (mut controller, _) = controller(true, None);
        let mut machine = VoiceStateMachine::new();
        let session = controller.start(&mut machine, request(false)).unwrap();

        let event = controller.handle(&mut machine, session, RecognitionNotice::Results(vec![]));
        assert_eq!(event, Some(RecognitionEvent::Error(ErrorKind::NoMatch)));
        assert_eq!(machine.state(), VoiceState::Error);
        assert!(!controller.microphone_held());
    }

    #[test]
    fn test_partials_only_when_enabled() {
        let (mut controller, _) = controller(true, None);
        let mut machine = VoiceStateMachine::new();
        let session = controller.start(&mut machine, request(false)).unwrap();
        let partial = RecognitionNotice::Partial(vec!["do".to_string()]);
        assert_eq!(controller.handle(&mut machine, session, partial.clone()), None);
        controller.shutdown(&mut machine);

        let session = controller.start(&mut machine, request(true)).unwrap();
        assert_eq!(
            controller.handle(&mut machine, session, partial),
            Some(RecognitionEvent::PartialResult("do".to_string()))
        );
        assert_eq!(machine.state(), VoiceState::Listening);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut controller, calls) = controller(true, None);
        let mut machine = VoiceStateMachine::new();
        assert!(!controller.stop());

        let session = controller.start(&mut machine, request(false)).unwrap();
        assert!(controller.stop());
        assert!(controller.stop());
        assert_eq!(calls.lock().unwrap().stops, 1);

        // still listening until the engine confirms
        assert!(controller.microphone_held());
        assert_eq!(
            controller.handle(&mut machine, session, RecognitionNotice::Stopped),
            Some(RecognitionEvent::Ended)
        );
        assert!(machine.is_idle());
        assert!(!controller.stop());
    }

    #[test]
    fn test_stale_notices_are_dropped() {
        let (mut controller, _) = controller(true, None);
        let mut machine = VoiceStateMachine::new();
        let first = controller.start(&mut machine, request(false)).unwrap();
        controller.handle(&mut machine, first, RecognitionNotice::Stopped);

        let second = controller.start(&mut machine, request(false)).unwrap();
        assert_ne!(first, second);
        assert_eq!(
            controller.handle(&mut machine, first, RecognitionNotice::Results(vec!["late".to_string()])),
            None
        );
        assert_eq!(machine.state(), VoiceState::Listening);
    }

    #[test]
    fn test_event_results() {
        let partial = RecognitionEvent::PartialResult("do".to_string());
        assert!(!partial.is_terminal());
        assert_eq!(partial.result().map(|r| r.is_final), Some(false));

        let last = RecognitionEvent::FinalResult("don't".to_string());
        assert!(last.is_terminal());
        assert_eq!(
            last.result(),
            Some(RecognitionResult {
                text: "don't".to_string(),
                is_final: true,
            })
        );
        assert_eq!(RecognitionEvent::Ended.result(), None);
    }

    #[test]
    fn test_shutdown_cancels() {
        let (mut controller, calls) = controller(true, None);
        let mut machine = VoiceStateMachine::new();
        controller.start(&mut machine, request(false)).unwrap();

        controller.shutdown(&mut machine);
        assert_eq!(calls.lock().unwrap().cancels, 1);
        assert!(machine.is_idle());
        assert!(!controller.microphone_held());
    }
}
