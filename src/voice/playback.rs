//! Audio playback to speakers
//!
//! Output goes through a single process-wide [`PlaybackContext`], opened on
//! first use and kept for the life of the process. Scheduling a buffer only
//! queues samples on the output stream; it does not wait for them to be heard.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use super::pcm::{SPEECH_SAMPLE_RATE, decode_base64_pcm16};
use crate::{Error, Result};

/// Plays encoded speech
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Decode a base64 PCM16 mono 24 kHz payload and start playing it
    ///
    /// Returns once playback is scheduled.
    ///
    /// # Errors
    ///
    /// Returns error if the payload cannot be decoded or no output is available
    async fn play(&self, encoded: &str) -> Result<()>;
}

static CONTEXT: OnceLock<PlaybackContext> = OnceLock::new();

/// Shared output stream fed through a channel
pub struct PlaybackContext {
    tx: mpsc::Sender<Vec<f32>>,
    channels: u16,
}

impl PlaybackContext {
    /// The process-wide context, opening the output device on first call
    ///
    /// # Errors
    ///
    /// Returns error if no suitable output device can be opened
    pub fn global() -> Result<&'static Self> {
        if let Some(ctx) = CONTEXT.get() {
            return Ok(ctx);
        }

        let ctx = Self::open()?;
        // A concurrent opener may have won; its context is kept and ours is
        // dropped, which ends our output thread.
        Ok(CONTEXT.get_or_init(|| ctx))
    }

    fn open() -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Vec<f32>>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<u16>>(1);

        std::thread::Builder::new()
            .name("gourmet-playback".to_string())
            .spawn(move || run_output(&rx, &ready_tx))?;

        let channels = ready_rx
            .recv()
            .map_err(|_| Error::Audio("playback thread exited during setup".to_string()))??;

        Ok(Self { tx, channels })
    }

    /// Queue mono samples for playback
    ///
    /// # Errors
    ///
    /// Returns error if the output thread has stopped
    pub fn schedule(&self, samples: Vec<f32>) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let count = samples.len();
        self.tx
            .send(samples)
            .map_err(|_| Error::Audio("playback thread stopped".to_string()))?;

        tracing::debug!(samples = count, channels = self.channels, "playback scheduled");
        Ok(())
    }
}

/// Output thread body: owns the stream and feeds it from the channel
fn run_output(rx: &mpsc::Receiver<Vec<f32>>, ready: &mpsc::SyncSender<Result<u16>>) {
    let queue: Arc<Mutex<VecDeque<f32>>> = Arc::new(Mutex::new(VecDeque::new()));

    let stream = match build_stream(Arc::clone(&queue)) {
        Ok((stream, channels)) => {
            let _ = ready.send(Ok(channels));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    while let Ok(samples) = rx.recv() {
        queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(samples);
    }

    drop(stream);
    tracing::debug!("playback context closed");
}

fn build_stream(queue: Arc<Mutex<VecDeque<f32>>>) -> Result<(cpal::Stream, u16)> {
    let host = cpal::default_host();

    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let config = output_config(&device)?;
    let channels = config.channels;
    let frame_width = usize::from(channels);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut queue = queue.lock().unwrap_or_else(PoisonError::into_inner);
                for frame in data.chunks_mut(frame_width) {
                    let sample = queue.pop_front().unwrap_or(0.0);
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = SPEECH_SAMPLE_RATE,
        channels,
        "audio playback initialized"
    );

    Ok((stream, channels))
}

/// Pick a mono config at the speech rate, falling back to stereo
fn output_config(device: &cpal::Device) -> Result<StreamConfig> {
    let rate = SampleRate(SPEECH_SAMPLE_RATE);
    let supports = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
        c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
    };

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| supports(c, 1))
        .or_else(|| device.supported_output_configs().ok()?.find(|c| supports(c, 2)))
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    Ok(supported.with_sample_rate(rate).config())
}

/// Speaker output backed by the process-wide playback context
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioPlayback;

impl AudioPlayback {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Queue raw mono samples at 24 kHz
    ///
    /// # Errors
    ///
    /// Returns error if the output device cannot be opened
    pub fn play_samples(&self, samples: Vec<f32>) -> Result<()> {
        PlaybackContext::global()?.schedule(samples)
    }
}

#[async_trait]
impl AudioOutput for AudioPlayback {
    async fn play(&self, encoded: &str) -> Result<()> {
        let samples = decode_base64_pcm16(encoded)?;
        // First use opens the device, which may block briefly
        tokio::task::spawn_blocking(move || PlaybackContext::global()?.schedule(samples))
            .await
            .map_err(|e| Error::Audio(e.to_string()))?
    }
}
