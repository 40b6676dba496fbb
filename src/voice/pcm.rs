//! 16-bit PCM decoding for synthesized speech

use base64::Engine;

use crate::Result;

/// Sample rate of synthesized speech
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

/// Decode little-endian signed 16-bit PCM into samples in `[-1.0, 1.0)`
///
/// A trailing odd byte cannot form a sample and is ignored.
#[must_use]
pub fn decode_pcm16(bytes: &[u8]) -> Vec<f32> {
    let chunks = bytes.chunks_exact(2);
    if !chunks.remainder().is_empty() {
        tracing::debug!(len = bytes.len(), "odd PCM payload length, dropping last byte");
    }

    chunks
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect()
}

/// Decode a base64 PCM16 payload as returned by the speech model
///
/// # Errors
///
/// Returns error if the payload is not valid base64
pub fn decode_base64_pcm16(encoded: &str) -> Result<Vec<f32>> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
    Ok(decode_pcm16(&bytes))
}
