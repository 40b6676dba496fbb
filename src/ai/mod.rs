//! Generative AI backend
//!
//! Three operations: mine order history from a screenshot, pick a meal for a
//! spoken command, and synthesize speech for a line of text.

pub mod api;
mod gemini;
pub mod prompts;
pub mod schema;

use async_trait::async_trait;

pub use gemini::{GeminiClient, parse_history, parse_suggestion};

use crate::Result;
use crate::order::{OrderRecord, Suggestion};
use crate::screen::ScreenImage;

/// Hosted model operations used by the interaction controller
#[async_trait]
pub trait AiClient: Send + Sync {
    /// Extract past orders from a screenshot
    ///
    /// Never fails: any problem yields an empty history.
    async fn extract_history(&self, image: &ScreenImage) -> Vec<OrderRecord>;

    /// Pick a meal for a command given the history and current location
    ///
    /// # Errors
    ///
    /// Returns `Error::Decision` if the request fails or the reply is incomplete
    async fn decide(
        &self,
        command: &str,
        history: &[OrderRecord],
        location: &str,
    ) -> Result<Suggestion>;

    /// Synthesize speech, returning base64 PCM16 mono 24 kHz
    ///
    /// `None` on any failure.
    async fn synthesize_speech(&self, text: &str) -> Option<String>;
}
