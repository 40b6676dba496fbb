//! Configuration management for the Gourmet assistant

pub mod file;

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;

use crate::settings::{DEFAULT_MODEL, DEFAULT_SYSTEM_INSTRUCTION, Settings};
use file::GourmetConfigFile;

/// Gemini REST endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Speech synthesis model
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Prebuilt synthesis voice
pub const DEFAULT_TTS_VOICE: &str = "Kore";

/// Intro spoken after the startup scan
pub const DEFAULT_WELCOME_MESSAGE: &str = "Welcome back. I've updated your taste profile from your latest orders. What can I get for you today?";

/// Delivery addresses used when none are configured
pub const DEFAULT_ADDRESSES: [&str; 2] = [
    "No. 123 Tech Park Road, Haidian District, Beijing",
    "Room 404, Building 2, Moonlight Garden, Shanghai",
];

/// Assistant configuration
#[derive(Debug)]
pub struct Config {
    /// Generative model configuration
    pub ai: AiConfig,

    /// Speech capture configuration
    pub voice: VoiceConfig,

    /// Ordering behaviour
    pub ordering: OrderingConfig,

    /// Startup screen scan
    pub screen: ScreenConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Generative model configuration
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// API base URL (no trailing slash)
    pub base_url: String,

    /// Initial user-editable settings
    pub settings: Settings,

    /// Speech synthesis model
    pub tts_model: String,

    /// Prebuilt voice name
    pub tts_voice: String,
}

/// Speech capture configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Use the microphone when available
    pub enabled: bool,

    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// Spoken language hint
    pub language: Option<String>,

    /// Longest single listen
    pub max_listen: Duration,
}

/// Ordering behaviour
#[derive(Debug, Clone)]
pub struct OrderingConfig {
    /// Known delivery addresses, current location first
    pub addresses: Vec<String>,

    /// Time spent in the ordered state before returning to idle
    pub order_placed_delay: Duration,

    /// Spoken after the startup scan
    pub welcome_message: Option<String>,
}

impl OrderingConfig {
    /// Location passed to the decision call
    #[must_use]
    pub fn location(&self) -> &str {
        self.addresses.first().map_or("", String::as_str)
    }
}

/// Startup screen scan
#[derive(Debug, Clone)]
pub struct ScreenConfig {
    /// Scan the screen at startup
    pub enabled: bool,

    /// Screenshot command template
    pub command: Option<String>,
}

/// API keys for external services
#[derive(Debug, Default)]
pub struct ApiKeys {
    /// Gemini API key
    pub gemini: Option<SecretString>,

    /// `OpenAI` API key (Whisper transcription)
    pub openai: Option<SecretString>,
}

impl Config {
    /// Load configuration from the environment and the standard config file
    #[must_use]
    pub fn load() -> Self {
        Self::resolve(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Load configuration using an explicit config file
    #[must_use]
    pub fn load_from(path: &Path) -> Self {
        Self::resolve(file::load_from(path), |key| std::env::var(key).ok())
    }

    /// Build configuration with priority env > file > default
    pub fn resolve(fc: GourmetConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let api_keys = ApiKeys {
            gemini: env("GEMINI_API_KEY")
                .or_else(|| env("GOOGLE_API_KEY"))
                .or_else(|| env("API_KEY"))
                .or(fc.api_keys.gemini)
                .map(SecretString::from),
            openai: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .map(SecretString::from),
        };

        let ai = AiConfig {
            base_url: env("GOURMET_API_BASE_URL")
                .or(fc.ai.base_url)
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            settings: Settings {
                model_name: env("GOURMET_MODEL")
                    .or(fc.ai.model)
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                system_instruction: env("GOURMET_SYSTEM_INSTRUCTION")
                    .or(fc.ai.system_instruction)
                    .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            },
            tts_model: env("GOURMET_TTS_MODEL")
                .or(fc.ai.tts_model)
                .unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            tts_voice: env("GOURMET_TTS_VOICE")
                .or(fc.ai.tts_voice)
                .unwrap_or_else(|| DEFAULT_TTS_VOICE.to_string()),
        };

        let voice = VoiceConfig {
            enabled: fc.voice.enabled.unwrap_or(true),
            stt_model: env("GOURMET_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            language: env("GOURMET_STT_LANGUAGE")
                .or(fc.voice.language)
                .or_else(|| Some("zh".to_string())),
            max_listen: Duration::from_secs(fc.voice.max_listen_secs.unwrap_or(15)),
        };

        let addresses = fc
            .ordering
            .addresses
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| DEFAULT_ADDRESSES.iter().map(ToString::to_string).collect());

        let order_placed_delay_ms = env("GOURMET_ORDER_DELAY_MS")
            .and_then(|v| v.parse().ok())
            .or(fc.ordering.order_placed_delay_ms)
            .unwrap_or(3000);

        let welcome_message = match fc.ordering.welcome_message {
            Some(m) if m.trim().is_empty() => None,
            Some(m) => Some(m),
            None => Some(DEFAULT_WELCOME_MESSAGE.to_string()),
        };

        let ordering = OrderingConfig {
            addresses,
            order_placed_delay: Duration::from_millis(order_placed_delay_ms),
            welcome_message,
        };

        let screen = ScreenConfig {
            enabled: fc.screen.enabled.unwrap_or(true),
            command: fc.screen.command,
        };

        Self {
            ai,
            voice,
            ordering,
            screen,
            api_keys,
        }
    }
}
