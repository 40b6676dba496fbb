//! Gourmet - voice-driven food ordering assistant
//!
//! This library provides the core of the assistant:
//! - Order history mined from a screenshot of a delivery app
//! - Spoken command capture (microphone + transcription, or typed fallback)
//! - Meal suggestions and speech synthesis via Gemini
//! - The interaction state machine tying them together
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Front end (REPL)                   │
//! └────────────────────┬────────────────────────────────┘
//!                      │ primary action / cancel
//! ┌────────────────────▼────────────────────────────────┐
//! │              Interaction controller                 │
//! │  Idle → Recording → Processing → Confirming → ...   │
//! └───┬──────────────┬───────────────┬──────────────┬───┘
//!     │              │               │              │
//! ┌───▼────┐   ┌─────▼─────┐   ┌─────▼─────┐   ┌────▼───┐
//! │ Screen │   │  Speech   │   │ AI client │   │ Audio  │
//! │snapshot│   │  capture  │   │ (Gemini)  │   │playback│
//! └────────┘   └───────────┘   └───────────┘   └────────┘
//! ```

pub mod ai;
pub mod config;
pub mod error;
pub mod interaction;
pub mod order;
pub mod screen;
pub mod settings;
pub mod voice;

pub use ai::{AiClient, GeminiClient};
pub use config::Config;
pub use error::{Error, Result};
pub use interaction::{AssistantHandle, Collaborators, ControllerOptions, InteractionView};
pub use order::{OrderRecord, Platform, Suggestion};
pub use screen::{ScreenImage, ScreenSnapshotProvider};
pub use settings::{Settings, SettingsStore};
