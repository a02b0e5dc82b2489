//! In-process engines for headless hosts
//!
//! Both engines do their work on threads they spawn, the way platform
//! engines deliver callbacks on threads they own.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::{
    CatalogError, EngineFault, LanguageStatus, RecognitionEngine, RecognitionNotice,
    RecognitionRequest, RecognitionSink, SynthesisEngine, SynthesisRequest, UtteranceNotice,
    UtteranceSink, VoiceInfo,
};

const RUNNING: u8 = 0;
const STOP: u8 = 1;
const CANCEL: u8 = 2;

/// Polling interval of the simulated worker threads
const TICK: Duration = Duration::from_millis(10);

/// Per-character speaking time at rate 1.0
const MS_PER_CHAR: u64 = 40;

/// Recognizer that "hears" a scripted transcript
///
/// An empty transcript produces a no-match error.
pub struct SimulatedRecognizer {
    transcript: Arc<Mutex<String>>,
    latency: Duration,
    control: Option<Arc<AtomicU8>>,
}

impl SimulatedRecognizer {
    /// Create a recognizer answering `transcript` after `latency`
    #[must_use]
    pub fn new(transcript: impl Into<String>, latency: Duration) -> Self {
        Self {
            transcript: Arc::new(Mutex::new(transcript.into())),
            latency,
            control: None,
        }
    }

    #[cfg(test)]
    fn transcript_handle(&self) -> Arc<Mutex<String>> {
        Arc::clone(&self.transcript)
    }

    fn signal(&mut self, value: u8) {
        if let Some(control) = self.control.take() {
            control.store(value, Ordering::SeqCst);
        }
    }
}

impl RecognitionEngine for SimulatedRecognizer {
    fn is_available(&self) -> bool {
        true
    }

    fn start(&mut self, request: &RecognitionRequest, sink: RecognitionSink) -> Result<(), EngineFault> {
        let transcript = self
            .transcript
            .lock()
            .map(|t| t.clone())
            .map_err(|_| EngineFault::Client)?;

        let control = Arc::new(AtomicU8::new(RUNNING));
        self.control = Some(Arc::clone(&control));
        let latency = self.latency;
        let partials = request.partial_results;

        thread::Builder::new()
            .name(format!("sim-recognizer-{}", sink.session().sequence()))
            .spawn(move || run_recognition(&sink, &control, &transcript, latency, partials))
            .map_err(|e| EngineFault::Other(e.to_string()))?;

        Ok(())
    }

    fn stop(&mut self) {
        self.signal(STOP);
    }

    fn cancel(&mut self) {
        self.signal(CANCEL);
    }
}

fn run_recognition(
    sink: &RecognitionSink,
    control: &AtomicU8,
    transcript: &str,
    latency: Duration,
    partials: bool,
) {
    sink.notify(RecognitionNotice::ReadyForSpeech);

    let mut waited = Duration::ZERO;
    let mut partial_sent = !partials;
    while waited < latency {
        match control.load(Ordering::SeqCst) {
            STOP => {
                sink.notify(RecognitionNotice::Stopped);
                return;
            }
            CANCEL => return,
            _ => {}
        }
        if !partial_sent
            && waited >= latency / 2
            && let Some(word) = transcript.split_whitespace().next()
        {
            sink.notify(RecognitionNotice::Partial(vec![word.to_string()]));
            partial_sent = true;
        }
        thread::sleep(TICK);
        waited += TICK;
    }

    if control.load(Ordering::SeqCst) == CANCEL {
        return;
    }
    if transcript.trim().is_empty() {
        sink.notify(RecognitionNotice::Error(EngineFault::NoMatch));
    } else {
        sink.notify(RecognitionNotice::Results(vec![transcript.to_string()]));
    }
}

/// Synthesizer with a fixed voice catalog whose utterances "play" for a
/// rate-scaled duration
pub struct SimulatedSynthesizer {
    catalog: Vec<VoiceInfo>,
    locale: Option<String>,
    rate: f32,
    pitch: f32,
    playing: Option<Arc<AtomicU8>>,
}

impl SimulatedSynthesizer {
    /// Create a synthesizer knowing the given voices
    #[must_use]
    pub const fn new(catalog: Vec<VoiceInfo>) -> Self {
        Self {
            catalog,
            locale: None,
            rate: 1.0,
            pitch: 1.0,
            playing: None,
        }
    }

    /// Synthesizer with one voice each for `en-US` and `es-ES`
    #[must_use]
    pub fn with_default_voices() -> Self {
        Self::new(vec![
            VoiceInfo {
                name: "en-us-x-sfg-local".to_string(),
                locale: "en-US".to_string(),
            },
            VoiceInfo {
                name: "es-es-x-eea-local".to_string(),
                locale: "es-ES".to_string(),
            },
        ])
    }

    #[cfg(test)]
    const fn pitch(&self) -> f32 {
        self.pitch
    }

    fn find(&self, locale: &str) -> Option<&VoiceInfo> {
        self.catalog.iter().find(|v| v.locale.eq_ignore_ascii_case(locale))
    }
}

impl SynthesisEngine for SimulatedSynthesizer {
    fn language_status(&self, locale: &str) -> LanguageStatus {
        if self.find(locale).is_some() {
            LanguageStatus::Available
        } else {
            LanguageStatus::NotSupported
        }
    }

    fn voice_for(&self, locale: &str) -> Result<Option<VoiceInfo>, CatalogError> {
        Ok(self.find(locale).cloned())
    }

    fn active_voice(&self) -> Option<VoiceInfo> {
        self.locale.as_deref().and_then(|l| self.find(l)).cloned()
    }

    fn active_locale(&self) -> Option<String> {
        self.locale.clone()
    }

    fn set_language(&mut self, locale: &str) -> Result<(), EngineFault> {
        if self.find(locale).is_none() {
            return Err(EngineFault::Other(format!("no voice for {locale}")));
        }
        self.locale = Some(locale.to_string());
        Ok(())
    }

    fn set_rate(&mut self, rate: f32) {
        self.rate = rate;
    }

    fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch;
    }

    fn speak(&mut self, request: &SynthesisRequest, sink: UtteranceSink) -> Result<(), EngineFault> {
        self.stop();

        let control = Arc::new(AtomicU8::new(RUNNING));
        self.playing = Some(Arc::clone(&control));

        let chars = u64::try_from(request.text.chars().count()).unwrap_or(u64::MAX);
        let base = Duration::from_millis(chars.saturating_mul(MS_PER_CHAR));
        let duration = base.div_f32(self.rate.max(f32::EPSILON));
        tracing::trace!(
            utterance = %sink.utterance(),
            rate = self.rate,
            pitch = self.pitch,
            ?duration,
            "simulated utterance"
        );

        thread::Builder::new()
            .name(format!("sim-synthesizer-{}", sink.utterance()))
            .spawn(move || {
                sink.notify(UtteranceNotice::Started);
                let mut played = Duration::ZERO;
                while played < duration {
                    if control.load(Ordering::SeqCst) != RUNNING {
                        // flushed: no terminal notification
                        return;
                    }
                    thread::sleep(TICK);
                    played += TICK;
                }
                if control.load(Ordering::SeqCst) == RUNNING {
                    sink.notify(UtteranceNotice::Completed);
                }
            })
            .map_err(|e| EngineFault::Other(e.to_string()))?;

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(control) = self.playing.take() {
            control.store(CANCEL, Ordering::SeqCst);
        }
    }
}
