//! End-of-utterance detection
//!
//! Decides when a spoken command is finished using RMS energy: speech
//! followed by a run of silence completes the utterance, and a long wait
//! with no speech at all gives up.

use super::capture::SAMPLE_RATE;

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to accept (0.3 seconds at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Silence duration that ends an utterance (0.5 seconds)
const SILENCE_SAMPLES: usize = 8000;

/// Give up if no speech starts within this many samples (5 seconds)
const NO_SPEECH_SAMPLES: usize = SAMPLE_RATE as usize * 5;

/// Progress of a single utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceState {
    /// Waiting for speech to start
    Waiting,
    /// Speech in progress
    Speaking,
    /// Speech followed by enough silence
    Complete,
    /// Nobody spoke
    NoSpeech,
}

/// Tracks one utterance from the first sound to trailing silence
pub struct UtteranceDetector {
    state: UtteranceState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
    waited: usize,
}

impl UtteranceDetector {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: UtteranceState::Waiting,
            speech_buffer: Vec::new(),
            silence_counter: 0,
            waited: 0,
        }
    }

    /// Feed a chunk of 16 kHz mono samples and return the new state
    pub fn process(&mut self, samples: &[f32]) -> UtteranceState {
        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            UtteranceState::Waiting => {
                if is_speech {
                    self.state = UtteranceState::Speaking;
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech started");
                } else {
                    self.waited += samples.len();
                    if self.waited > NO_SPEECH_SAMPLES {
                        tracing::debug!("no speech detected");
                        self.state = UtteranceState::NoSpeech;
                    }
                }
            }
            UtteranceState::Speaking => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.silence_counter > SILENCE_SAMPLES {
                    if self.speech_buffer.len() > MIN_SPEECH_SAMPLES + self.silence_counter {
                        tracing::debug!(samples = self.speech_buffer.len(), "utterance complete");
                        self.state = UtteranceState::Complete;
                    } else {
                        // A click or cough, not a command
                        tracing::trace!("speech too short, waiting again");
                        self.speech_buffer.clear();
                        self.silence_counter = 0;
                        self.state = UtteranceState::Waiting;
                    }
                }
            }
            UtteranceState::Complete | UtteranceState::NoSpeech => {}
        }

        self.state
    }

    /// Take the recorded utterance, leaving the detector empty
    pub fn take_utterance(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.speech_buffer)
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> UtteranceState {
        self.state
    }
}

impl Default for UtteranceDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
