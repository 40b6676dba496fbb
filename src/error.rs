//! Error types for the Gourmet assistant

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Rejected settings update
    #[error("settings error: {0}")]
    Settings(String),

    /// Audio device or playback error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech capture error (microphone, recognizer, manual entry)
    #[error("capture error: {0}")]
    Capture(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// AI service transport or API error
    #[error("AI service error: {0}")]
    Ai(String),

    /// Decision call produced no usable suggestion
    #[error("decision error: {0}")]
    Decision(String),

    /// Screen snapshot error
    #[error("screen capture error: {0}")]
    Screen(String),

    /// Interaction controller is unavailable
    #[error("interaction error: {0}")]
    Interaction(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Base64 decoding error
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Image decoding or encoding error
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
