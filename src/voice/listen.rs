//! Single-shot speech capture
//!
//! A [`CaptureSession`] runs one listen and reports exactly one terminal
//! [`CaptureOutcome`]. Cancelling fills the terminal slot first, so whatever
//! the recognizer produces afterwards is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tokio::sync::{Notify, mpsc, oneshot};

use super::capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
use super::stt::SpeechToText;
use crate::config::Config;
use crate::{Error, Result};

/// Prompt shown when typing replaces speaking
pub const MANUAL_PROMPT: &str = "Speak your order:";

/// Listens for one spoken command
#[async_trait]
pub trait SpeechCapture: Send + Sync {
    /// Capture a single utterance
    ///
    /// `Ok(None)` means nothing was said. Implementations should return
    /// promptly once `stop` is raised.
    ///
    /// # Errors
    ///
    /// Returns error if the recognizer fails (e.g. permission denied)
    async fn listen(&self, stop: StopSignal) -> Result<Option<String>>;

    /// Short adapter name for logs
    fn name(&self) -> &'static str;
}

/// Terminal event of a capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Transcript(String),
    NoSpeech,
    Failed(String),
    Cancelled,
}

impl CaptureOutcome {
    fn from_listen(result: Result<Option<String>>) -> Self {
        match result {
            Ok(Some(text)) if !text.trim().is_empty() => Self::Transcript(text.trim().to_string()),
            Ok(_) => Self::NoSpeech,
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

/// Request for a capture to stop, observable from async and blocking code
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    raised: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Resolve once the signal is raised
    pub async fn raised(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_raised() {
                return;
            }
            notified.await;
        }
    }
}

/// First-wins slot for the session's terminal event
struct Terminal {
    tx: Mutex<Option<oneshot::Sender<CaptureOutcome>>>,
}

impl Terminal {
    fn finish(&self, outcome: CaptureOutcome) -> bool {
        let sender = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        match sender {
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            }
            None => {
                tracing::debug!(?outcome, "capture already finished, ignoring late event");
                false
            }
        }
    }
}

/// Cancel handle for a running capture
#[derive(Clone)]
pub struct CaptureHandle {
    terminal: Arc<Terminal>,
    stop: StopSignal,
}

impl CaptureHandle {
    /// Cancel the capture
    ///
    /// Returns `true` if this was the session's terminal event.
    pub fn cancel(&self) -> bool {
        let first = self.terminal.finish(CaptureOutcome::Cancelled);
        self.stop.raise();
        first
    }
}

/// One listen in flight
pub struct CaptureSession {
    handle: CaptureHandle,
    outcome: oneshot::Receiver<CaptureOutcome>,
}

impl CaptureSession {
    /// Start listening on a background task
    #[must_use]
    pub fn start(capture: Arc<dyn SpeechCapture>) -> Self {
        let (tx, outcome) = oneshot::channel();
        let handle = CaptureHandle {
            terminal: Arc::new(Terminal {
                tx: Mutex::new(Some(tx)),
            }),
            stop: StopSignal::new(),
        };

        let task_handle = handle.clone();
        tokio::spawn(async move {
            let stop = task_handle.stop.clone();
            tracing::debug!(adapter = capture.name(), "capture started");

            let outcome = tokio::select! {
                biased;
                result = capture.listen(stop.clone()) => CaptureOutcome::from_listen(result),
                () = stop.raised() => CaptureOutcome::Cancelled,
            };
            task_handle.terminal.finish(outcome);
        });

        Self { handle, outcome }
    }

    #[must_use]
    pub fn handle(&self) -> CaptureHandle {
        self.handle.clone()
    }

    /// Wait for the terminal event
    pub async fn finished(self) -> CaptureOutcome {
        self.outcome.await.unwrap_or(CaptureOutcome::Cancelled)
    }
}

/// Microphone recording transcribed by a hosted STT model
pub struct MicrophoneCapture {
    stt: SpeechToText,
    max_listen: Duration,
}

impl MicrophoneCapture {
    #[must_use]
    pub const fn new(stt: SpeechToText, max_listen: Duration) -> Self {
        Self { stt, max_listen }
    }
}

#[async_trait]
impl SpeechCapture for MicrophoneCapture {
    async fn listen(&self, stop: StopSignal) -> Result<Option<String>> {
        let max_listen = self.max_listen;
        let recorder_stop = stop.clone();

        let samples = tokio::task::spawn_blocking(move || {
            let mut capture = AudioCapture::new()?;
            capture.record_utterance(&recorder_stop, max_listen)
        })
        .await
        .map_err(|e| Error::Capture(e.to_string()))??;

        let Some(samples) = samples else {
            return Ok(None);
        };
        if stop.is_raised() {
            return Ok(None);
        }

        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
        let transcript = self.stt.transcribe(&wav).await?;
        Ok(Some(transcript))
    }

    fn name(&self) -> &'static str {
        "microphone"
    }
}

/// Typed input standing in for speech recognition
pub struct ManualEntryCapture {
    lines: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
}

/// Front-end side of a [`ManualEntryCapture`]
#[derive(Clone)]
pub struct ManualEntry {
    tx: mpsc::UnboundedSender<String>,
}

impl ManualEntry {
    /// Hand a typed line to the waiting capture; an empty line means nothing was said
    ///
    /// # Errors
    ///
    /// Returns error if the capture side was dropped
    pub fn submit(&self, line: impl Into<String>) -> Result<()> {
        self.tx
            .send(line.into())
            .map_err(|_| Error::Capture("manual entry closed".to_string()))
    }
}

/// Create a connected manual entry pair
#[must_use]
pub fn manual_entry() -> (ManualEntry, ManualEntryCapture) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ManualEntry { tx },
        ManualEntryCapture {
            lines: tokio::sync::Mutex::new(rx),
        },
    )
}

#[async_trait]
impl SpeechCapture for ManualEntryCapture {
    async fn listen(&self, _stop: StopSignal) -> Result<Option<String>> {
        let mut lines = self.lines.lock().await;

        // Lines typed before this listen started belong to nobody
        while lines.try_recv().is_ok() {}

        tracing::info!("{MANUAL_PROMPT}");
        let line = lines
            .recv()
            .await
            .ok_or_else(|| Error::Capture("manual entry closed".to_string()))?;

        let text = line.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}

/// Pick microphone capture when possible, manual entry otherwise
///
/// Returns the manual entry handle when the fallback is selected.
#[must_use]
pub fn select_capture(
    config: &Config,
    force_manual: bool,
) -> (Arc<dyn SpeechCapture>, Option<ManualEntry>) {
    if !force_manual && config.voice.enabled {
        match microphone_capture(config) {
            Ok(capture) => {
                tracing::info!("using microphone speech capture");
                return (Arc::new(capture), None);
            }
            Err(e) => {
                tracing::info!(reason = %e, "speech recognition unavailable, using manual entry");
            }
        }
    }

    let (entry, capture) = manual_entry();
    (Arc::new(capture), Some(entry))
}

fn microphone_capture(config: &Config) -> Result<MicrophoneCapture> {
    if !AudioCapture::is_available() {
        return Err(Error::Capture("no input device".to_string()));
    }

    let api_key = config
        .api_keys
        .openai
        .as_ref()
        .ok_or_else(|| Error::Config("OPENAI_API_KEY not set".to_string()))?;

    let stt = SpeechToText::new_whisper(
        api_key.expose_secret(),
        config.voice.stt_model.clone(),
        config.voice.language.clone(),
    )?;

    Ok(MicrophoneCapture::new(stt, config.voice.max_listen))
}
