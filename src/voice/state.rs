//! Voice state machine
//!
//! One `VoiceStateMachine` exists per bridge and is owned by the dispatcher.
//! Every transition goes through [`VoiceStateMachine::apply`], which only
//! allows these edges:
//!
//! ```text
//! Idle      --BeginListening--> Listening
//! Listening --EndListening----> Idle
//! Idle      --BeginSpeaking---> Speaking
//! Speaking  --BeginSpeaking---> Speaking   (flush)
//! Speaking  --EndSpeaking-----> Idle
//! Listening --Fault-----------> Error
//! Speaking  --Fault-----------> Error
//! Error     --Recover---------> Idle
//! ```

use serde::Serialize;
use thiserror::Error;

/// Authoritative voice state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceState {
    /// Nothing in flight
    #[default]
    Idle,
    /// A recognition session holds the microphone
    Listening,
    /// An utterance is being synthesized
    Speaking,
    /// A controller failed; left as soon as the error is reported
    Error,
}

/// Event that moves the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Recognition session accepted
    BeginListening,
    /// Recognition session reached a final result or stop completion
    EndListening,
    /// Utterance accepted (also used for a flushing re-speak)
    BeginSpeaking,
    /// Active utterance completed
    EndSpeaking,
    /// Active operation failed
    Fault,
    /// Error reported, back to idle
    Recover,
}

impl VoiceState {
    /// State reached by applying `transition`, if the edge exists
    #[must_use]
    pub const fn after(self, transition: Transition) -> Option<Self> {
        match (self, transition) {
            (Self::Idle, Transition::BeginListening) => Some(Self::Listening),
            (Self::Idle | Self::Speaking, Transition::BeginSpeaking) => Some(Self::Speaking),
            (Self::Listening, Transition::EndListening)
            | (Self::Speaking, Transition::EndSpeaking)
            | (Self::Error, Transition::Recover) => Some(Self::Idle),
            (Self::Listening | Self::Speaking, Transition::Fault) => Some(Self::Error),
            _ => None,
        }
    }
}

/// Attempted edge that does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no {transition:?} edge from {from:?}")]
pub struct InvalidTransition {
    /// State the machine was in
    pub from: VoiceState,
    /// Rejected transition
    pub transition: Transition,
}

/// Holder of the single authoritative [`VoiceState`]
#[derive(Debug, Default)]
pub struct VoiceStateMachine {
    state: VoiceState,
}

impl VoiceStateMachine {
    /// Create a machine in `Idle`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> VoiceState {
        self.state
    }

    /// Check if nothing is in flight
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == VoiceState::Idle
    }

    /// Apply a transition
    ///
    /// # Errors
    ///
    /// Returns error if the edge does not exist; the state is left unchanged
    pub fn apply(&mut self, transition: Transition) -> Result<VoiceState, InvalidTransition> {
        let from = self.state;
        let Some(next) = from.after(transition) else {
            tracing::debug!(?from, ?transition, "rejected voice state transition");
            return Err(InvalidTransition { from, transition });
        };

        self.state = next;
        tracing::trace!(?from, ?transition, to = ?next, "voice state transition");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listening_round_trip() {
        let mut machine = VoiceStateMachine::new();
        assert_eq!(machine.apply(Transition::BeginListening), Ok(VoiceState::Listening));
        assert_eq!(machine.apply(Transition::EndListening), Ok(VoiceState::Idle));
    }

    #[test]
    fn test_speaking_flush_stays_speaking() {
        let mut machine = VoiceStateMachine::new();
        machine.apply(Transition::BeginSpeaking).unwrap();
        assert_eq!(machine.apply(Transition::BeginSpeaking), Ok(VoiceState::Speaking));
        assert_eq!(machine.apply(Transition::EndSpeaking), Ok(VoiceState::Idle));
    }

    #[test]
    fn test_fault_then_recover() {
        let mut machine = VoiceStateMachine::new();
        machine.apply(Transition::BeginListening).unwrap();
        assert_eq!(machine.apply(Transition::Fault), Ok(VoiceState::Error));
        assert_eq!(machine.apply(Transition::Recover), Ok(VoiceState::Idle));
    }

    #[test]
    fn test_no_overlap_between_listening_and_speaking() {
        let mut machine = VoiceStateMachine::new();
        machine.apply(Transition::BeginListening).unwrap();

        let err = machine.apply(Transition::BeginSpeaking).unwrap_err();
        assert_eq!(err.from, VoiceState::Listening);
        assert_eq!(machine.state(), VoiceState::Listening);

        assert!(machine.apply(Transition::BeginListening).is_err());
    }

    #[test]
    fn test_idle_rejects_terminal_edges() {
        let mut machine = VoiceStateMachine::new();
        for transition in [
            Transition::EndListening,
            Transition::EndSpeaking,
            Transition::Fault,
            Transition::Recover,
        ] {
            assert!(machine.apply(transition).is_err(), "{transition:?}");
            assert!(machine.is_idle());
        }
    }
}
