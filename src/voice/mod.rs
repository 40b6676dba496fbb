//! Voice processing module
//!
//! Handles speech capture (microphone, end-of-utterance detection, Whisper
//! transcription, manual entry fallback) and playback of synthesized speech.

mod capture;
mod listen;
mod pcm;
mod playback;
mod stt;
mod utterance;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use listen::{
    CaptureHandle, CaptureOutcome, CaptureSession, MANUAL_PROMPT, ManualEntry, ManualEntryCapture,
    MicrophoneCapture, SpeechCapture, StopSignal, manual_entry, select_capture,
};
pub use pcm::{SPEECH_SAMPLE_RATE, decode_base64_pcm16, decode_pcm16};
pub use playback::{AudioOutput, AudioPlayback, PlaybackContext};
pub use stt::SpeechToText;
pub use utterance::{UtteranceDetector, UtteranceState, calculate_energy};
