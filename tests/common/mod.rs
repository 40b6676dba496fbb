//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gourmet_assistant::interaction::{self, AssistantHandle, Collaborators, ControllerOptions};
use gourmet_assistant::voice::{AudioOutput, SpeechCapture, StopSignal};
use gourmet_assistant::{
    AiClient, Error, OrderRecord, Platform, Result, ScreenImage, ScreenSnapshotProvider,
    Suggestion,
};
use tokio::sync::{mpsc, oneshot};

/// The suggestion used across interaction tests
#[must_use]
pub fn noodles() -> Suggestion {
    Suggestion {
        suggested_meal: "Beef Noodles".to_string(),
        restaurant: "Lanzhou Noodle House".to_string(),
        spoken_response: "How about Beef Noodles from Lanzhou Noodle House again?".to_string(),
        is_new_location: false,
    }
}

/// A small order history
#[must_use]
pub fn noodle_history() -> Vec<OrderRecord> {
    vec![
        OrderRecord {
            id: "order-1".to_string(),
            restaurant: "Lanzhou Noodle House".to_string(),
            items: vec!["Beef Noodles".to_string(), "Cucumber Salad".to_string()],
            total: 32.0,
            platform: Platform::Meituan,
            date: "2024-05-01".to_string(),
        },
        OrderRecord {
            id: "order-2".to_string(),
            restaurant: "Sichuan Kitchen".to_string(),
            items: vec!["Mapo Tofu".to_string()],
            total: 28.5,
            platform: Platform::Eleme,
            date: "2024-05-03".to_string(),
        },
    ]
}

/// One decision call as the fake AI saw it
#[derive(Debug, Clone)]
pub struct DecisionCall {
    pub command: String,
    pub history_len: usize,
    pub location: String,
}

/// AI client whose decisions are released by the test
pub struct FakeAi {
    history: Vec<OrderRecord>,
    decisions: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<Suggestion>>>,
    speech_gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub calls: Mutex<Vec<DecisionCall>>,
    pub spoken: Mutex<Vec<String>>,
    pub extractions: AtomicUsize,
}

/// Test side of a [`FakeAi`]
pub struct DecisionGate {
    tx: mpsc::UnboundedSender<Result<Suggestion>>,
}

impl DecisionGate {
    pub fn resolve(&self, suggestion: Suggestion) {
        self.tx.send(Ok(suggestion)).unwrap();
    }

    pub fn reject(&self, error: Error) {
        self.tx.send(Err(error)).unwrap();
    }
}

impl FakeAi {
    /// Create a fake that extracts `history` from any screenshot
    #[must_use]
    pub fn new(history: Vec<OrderRecord>) -> (Arc<Self>, DecisionGate) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ai = Arc::new(Self {
            history,
            decisions: tokio::sync::Mutex::new(rx),
            speech_gate: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            spoken: Mutex::new(Vec::new()),
            extractions: AtomicUsize::new(0),
        });
        (ai, DecisionGate { tx })
    }

    /// Make the next synthesis wait until the returned sender fires
    pub fn hold_next_speech(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.speech_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn calls(&self) -> Vec<DecisionCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiClient for FakeAi {
    async fn extract_history(&self, _image: &ScreenImage) -> Vec<OrderRecord> {
        self.extractions.fetch_add(1, Ordering::SeqCst);
        self.history.clone()
    }

    async fn decide(
        &self,
        command: &str,
        history: &[OrderRecord],
        location: &str,
    ) -> Result<Suggestion> {
        self.calls.lock().unwrap().push(DecisionCall {
            command: command.to_string(),
            history_len: history.len(),
            location: location.to_string(),
        });

        self.decisions
            .lock()
            .await
            .recv()
            .await
            .unwrap_or_else(|| Err(Error::Decision("no decision scripted".to_string())))
    }

    async fn synthesize_speech(&self, text: &str) -> Option<String> {
        let gate = self.speech_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        self.spoken.lock().unwrap().push(text.to_string());
        Some(format!("audio:{text}"))
    }
}

/// What a [`ScriptedCapture`] does on each listen
#[derive(Debug, Clone)]
pub enum Listen {
    Say(String),
    Silence,
    Fail(String),
    /// Wait until stopped
    Hang,
}

/// Speech capture following a script; listens past the end hang
pub struct ScriptedCapture {
    script: Mutex<VecDeque<Listen>>,
    pub listens: AtomicUsize,
    pub stopped: AtomicUsize,
}

impl ScriptedCapture {
    #[must_use]
    pub fn new(script: impl IntoIterator<Item = Listen>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            listens: AtomicUsize::new(0),
            stopped: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SpeechCapture for ScriptedCapture {
    async fn listen(&self, stop: StopSignal) -> Result<Option<String>> {
        self.listens.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front().unwrap_or(Listen::Hang);

        match step {
            Listen::Say(text) => Ok(Some(text)),
            Listen::Silence => Ok(None),
            Listen::Fail(reason) => Err(Error::Capture(reason)),
            Listen::Hang => {
                stop.raised().await;
                self.stopped.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Audio output that records what it was asked to play
#[derive(Default)]
pub struct RecordingAudio {
    played: Mutex<Vec<String>>,
}

impl RecordingAudio {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioOutput for RecordingAudio {
    async fn play(&self, encoded: &str) -> Result<()> {
        self.played.lock().unwrap().push(encoded.to_string());
        Ok(())
    }
}

/// Screen provider returning a fixed image or failing
pub struct FakeScreen {
    fail: bool,
}

impl FakeScreen {
    #[must_use]
    pub fn working() -> Arc<Self> {
        Arc::new(Self { fail: false })
    }

    #[must_use]
    pub fn broken() -> Arc<Self> {
        Arc::new(Self { fail: true })
    }
}

#[async_trait]
impl ScreenSnapshotProvider for FakeScreen {
    async fn snapshot(&self) -> Result<ScreenImage> {
        if self.fail {
            return Err(Error::Screen("permission denied".to_string()));
        }
        Ok(ScreenImage::jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9]))
    }
}

/// A running controller wired to fakes
pub struct Harness {
    pub handle: AssistantHandle,
    pub ai: Arc<FakeAi>,
    pub decisions: DecisionGate,
    pub capture: Arc<ScriptedCapture>,
    pub audio: Arc<RecordingAudio>,
    pub options: ControllerOptions,
}

impl Harness {
    #[must_use]
    pub fn start(script: impl IntoIterator<Item = Listen>) -> Self {
        Self::build(script, None, Vec::new())
    }

    #[must_use]
    pub fn with_screen(
        screen: Arc<dyn ScreenSnapshotProvider>,
        extracted: Vec<OrderRecord>,
    ) -> Self {
        Self::build([], Some(screen), extracted)
    }

    fn build(
        script: impl IntoIterator<Item = Listen>,
        screen: Option<Arc<dyn ScreenSnapshotProvider>>,
        extracted: Vec<OrderRecord>,
    ) -> Self {
        let (ai, decisions) = FakeAi::new(extracted);
        let capture = ScriptedCapture::new(script);
        let audio = RecordingAudio::new();
        let options = ControllerOptions::default();

        let collaborators = Collaborators {
            ai: ai.clone(),
            capture: capture.clone(),
            audio: audio.clone(),
            screen,
        };
        let (handle, _task) = interaction::spawn(collaborators, options.clone());

        Self {
            handle,
            ai,
            decisions,
            capture,
            audio,
            options,
        }
    }
}
