//! Shared test utilities
//!
//! Scripted engines record every call the bridge makes and hand their sinks
//! back to the test, which then plays the engine by firing notices.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use vocab_voice::voice::{
    CatalogError, EngineFault, LanguageStatus, MicrophonePermission, Navigator, PermissionStatus,
    RecognitionEngine, RecognitionNotice, RecognitionRequest, RecognitionSink, SynthesisEngine,
    SynthesisRequest, UtteranceNotice, UtteranceSink, VoiceInfo,
};
use vocab_voice::{ChannelSurface, VoiceBridge, VoiceConfig, VoiceSnapshot};

/// How long to wait for something that should happen
pub const PATIENCE: Duration = Duration::from_secs(2);

/// How long to wait before concluding nothing else will happen
pub const QUIET: Duration = Duration::from_millis(100);

/// Everything the scripted recognizer saw
#[derive(Default)]
pub struct RecognizerLog {
    pub available: bool,
    pub requests: Vec<RecognitionRequest>,
    pub sinks: Vec<RecognitionSink>,
    pub stops: usize,
    pub cancels: usize,
}

/// Recognizer played by the test
#[derive(Clone)]
pub struct ScriptedRecognizer {
    log: Arc<Mutex<RecognizerLog>>,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(RecognizerLog {
                available: true,
                ..RecognizerLog::default()
            })),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.log.lock().unwrap().available = available;
    }

    pub fn starts(&self) -> usize {
        self.log.lock().unwrap().sinks.len()
    }

    pub fn stops(&self) -> usize {
        self.log.lock().unwrap().stops
    }

    pub fn cancels(&self) -> usize {
        self.log.lock().unwrap().cancels
    }

    pub fn last_request(&self) -> RecognitionRequest {
        self.log.lock().unwrap().requests.last().cloned().unwrap()
    }

    /// Sink of the `n`th session (zero based)
    pub fn sink(&self, n: usize) -> RecognitionSink {
        self.log.lock().unwrap().sinks[n].clone()
    }

    /// Fire a notice on the latest session, from an engine-owned thread
    pub fn fire(&self, notice: RecognitionNotice) {
        let sink = self.log.lock().unwrap().sinks.last().cloned().unwrap();
        std::thread::spawn(move || sink.notify(notice)).join().unwrap();
    }
}

impl RecognitionEngine for ScriptedRecognizer {
    fn is_available(&self) -> bool {
        self.log.lock().unwrap().available
    }

    fn start(&mut self, request: &RecognitionRequest, sink: RecognitionSink) -> Result<(), EngineFault> {
        let mut log = self.log.lock().unwrap();
        log.requests.push(request.clone());
        log.sinks.push(sink);
        Ok(())
    }

    fn stop(&mut self) {
        self.log.lock().unwrap().stops += 1;
    }

    fn cancel(&mut self) {
        self.log.lock().unwrap().cancels += 1;
    }
}

/// Everything the scripted synthesizer saw
#[derive(Default)]
pub struct SynthesizerLog {
    pub catalog: Vec<VoiceInfo>,
    pub catalog_api: bool,
    pub locale: Option<String>,
    pub locales_set: Vec<String>,
    pub rates: Vec<f32>,
    pub pitches: Vec<f32>,
    pub requests: Vec<SynthesisRequest>,
    pub sinks: Vec<UtteranceSink>,
    pub stops: usize,
    pub reject_speak: bool,
}

/// Synthesizer played by the test
#[derive(Clone)]
pub struct ScriptedSynthesizer {
    log: Arc<Mutex<SynthesizerLog>>,
}

impl ScriptedSynthesizer {
    /// Synthesizer with `en-US` and `es-ES` voices
    pub fn new() -> Self {
        Self::with_catalog(vec![
            voice("en-us-x-sfg-local", "en-US"),
            voice("es-es-x-eea-local", "es-ES"),
        ])
    }

    pub fn with_catalog(catalog: Vec<VoiceInfo>) -> Self {
        Self {
            log: Arc::new(Mutex::new(SynthesizerLog {
                catalog,
                catalog_api: true,
                ..SynthesizerLog::default()
            })),
        }
    }

    /// Drop the catalog API, forcing lookups through a language switch
    pub fn without_catalog_api(self) -> Self {
        self.log.lock().unwrap().catalog_api = false;
        self
    }

    pub fn log<T>(&self, f: impl FnOnce(&SynthesizerLog) -> T) -> T {
        f(&self.log.lock().unwrap())
    }

    /// Refuse every later utterance
    pub fn reject_speak(&self) {
        self.log.lock().unwrap().reject_speak = true;
    }

    pub fn spoken(&self) -> Vec<String> {
        self.log(|log| log.requests.iter().map(|r| r.text.clone()).collect())
    }

    pub fn stops(&self) -> usize {
        self.log(|log| log.stops)
    }

    /// Sink of the `n`th utterance (zero based)
    pub fn sink(&self, n: usize) -> UtteranceSink {
        self.log.lock().unwrap().sinks[n].clone()
    }

    /// Fire a notice for the `n`th utterance, from an engine-owned thread
    pub fn fire(&self, n: usize, notice: UtteranceNotice) {
        let sink = self.sink(n);
        std::thread::spawn(move || sink.notify(notice)).join().unwrap();
    }

    fn find(log: &SynthesizerLog, locale: &str) -> Option<VoiceInfo> {
        log.catalog
            .iter()
            .find(|v| v.locale.eq_ignore_ascii_case(locale))
            .cloned()
    }
}

impl SynthesisEngine for ScriptedSynthesizer {
    fn language_status(&self, locale: &str) -> LanguageStatus {
        let log = self.log.lock().unwrap();
        if Self::find(&log, locale).is_some() {
            LanguageStatus::Available
        } else {
            LanguageStatus::MissingData
        }
    }

    fn voice_for(&self, locale: &str) -> Result<Option<VoiceInfo>, CatalogError> {
        let log = self.log.lock().unwrap();
        if !log.catalog_api {
            return Err(CatalogError::Unavailable);
        }
        Ok(Self::find(&log, locale))
    }

    fn active_voice(&self) -> Option<VoiceInfo> {
        let log = self.log.lock().unwrap();
        log.locale.as_deref().and_then(|l| Self::find(&log, l))
    }

    fn active_locale(&self) -> Option<String> {
        self.log.lock().unwrap().locale.clone()
    }

    fn set_language(&mut self, locale: &str) -> Result<(), EngineFault> {
        let mut log = self.log.lock().unwrap();
        log.locale = Some(locale.to_string());
        log.locales_set.push(locale.to_string());
        Ok(())
    }

    fn set_rate(&mut self, rate: f32) {
        self.log.lock().unwrap().rates.push(rate);
    }

    fn set_pitch(&mut self, pitch: f32) {
        self.log.lock().unwrap().pitches.push(pitch);
    }

    fn speak(&mut self, request: &SynthesisRequest, sink: UtteranceSink) -> Result<(), EngineFault> {
        let mut log = self.log.lock().unwrap();
        if log.reject_speak {
            return Err(EngineFault::Other("queue full".to_string()));
        }
        log.requests.push(request.clone());
        log.sinks.push(sink);
        Ok(())
    }

    fn stop(&mut self) {
        self.log.lock().unwrap().stops += 1;
    }
}

/// Permission source that always refuses
pub struct DeniedPermission;

impl MicrophonePermission for DeniedPermission {
    fn status(&self) -> PermissionStatus {
        PermissionStatus::Denied
    }
}

/// Navigator recording what it was asked to open
#[derive(Clone, Default)]
pub struct RecordingNavigator {
    pub opened: Arc<Mutex<Vec<String>>>,
}

impl Navigator for RecordingNavigator {
    fn open_tts_settings(&mut self) -> Result<(), EngineFault> {
        self.opened.lock().unwrap().push("tts-settings".to_string());
        Ok(())
    }

    fn open_browser(&mut self, url: &url::Url) -> Result<(), EngineFault> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

pub fn voice(name: &str, locale: &str) -> VoiceInfo {
    VoiceInfo {
        name: name.to_string(),
        locale: locale.to_string(),
    }
}

/// A running bridge wired to scripted engines
pub struct Harness {
    pub bridge: VoiceBridge,
    pub invocations: mpsc::UnboundedReceiver<String>,
    pub recognizer: ScriptedRecognizer,
    pub synthesizer: ScriptedSynthesizer,
    pub navigator: RecordingNavigator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(VoiceConfig::default(), ScriptedSynthesizer::new())
    }

    pub fn with(config: VoiceConfig, synthesizer: ScriptedSynthesizer) -> Self {
        let recognizer = ScriptedRecognizer::new();
        let navigator = RecordingNavigator::default();
        let (surface, invocations) = ChannelSurface::new();

        let bridge = VoiceBridge::builder(config)
            .recognizer(recognizer.clone())
            .synthesizer(synthesizer.clone())
            .navigator(navigator.clone())
            .spawn(surface);

        Self {
            bridge,
            invocations,
            recognizer,
            synthesizer,
            navigator,
        }
    }

    /// Next invocation on the surface
    pub async fn next(&mut self) -> String {
        tokio::time::timeout(PATIENCE, self.invocations.recv())
            .await
            .expect("timed out waiting for an invocation")
            .expect("surface closed")
    }

    /// Assert nothing further reaches the surface
    pub async fn assert_quiet(&mut self) {
        if let Ok(Some(invocation)) = tokio::time::timeout(QUIET, self.invocations.recv()).await {
            panic!("unexpected invocation: {invocation}");
        }
    }

    /// Round trip through the dispatcher; every earlier call has been
    /// handled once this returns
    pub async fn settle(&self) {
        self.bridge.get_voice_name("en").await.unwrap();
    }

    /// Wait until the published snapshot satisfies `predicate`
    pub async fn wait_for(&self, predicate: impl FnMut(&VoiceSnapshot) -> bool) -> VoiceSnapshot {
        let mut rx = self.bridge.subscribe();
        let snapshot = tokio::time::timeout(PATIENCE, rx.wait_for(predicate))
            .await
            .expect("timed out waiting for voice state")
            .expect("bridge closed");
        *snapshot
    }
}
