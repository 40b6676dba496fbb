//! TOML configuration file loading
//!
//! Supports `~/.config/gourmet/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct GourmetConfigFile {
    /// Generative model configuration
    #[serde(default)]
    pub ai: AiFileConfig,

    /// Speech capture configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Ordering behaviour
    #[serde(default)]
    pub ordering: OrderingFileConfig,

    /// Startup screen scan
    #[serde(default)]
    pub screen: ScreenFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Generative model configuration
#[derive(Debug, Default, Deserialize)]
pub struct AiFileConfig {
    /// API base URL
    pub base_url: Option<String>,

    /// Model identifier (e.g. "gemini-3-flash-preview")
    pub model: Option<String>,

    /// System instruction sent with decision requests
    pub system_instruction: Option<String>,

    /// Speech synthesis model
    pub tts_model: Option<String>,

    /// Prebuilt voice name (e.g. "Kore")
    pub tts_voice: Option<String>,
}

/// Speech capture configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Use the microphone when available
    pub enabled: Option<bool>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// Spoken language hint (ISO-639-1)
    pub language: Option<String>,

    /// Give up listening after this many seconds
    pub max_listen_secs: Option<u64>,
}

/// Ordering behaviour
#[derive(Debug, Default, Deserialize)]
pub struct OrderingFileConfig {
    /// Delivery addresses; the first one is the current location
    pub addresses: Option<Vec<String>>,

    /// How long the "ordered" state lasts before returning to idle
    pub order_placed_delay_ms: Option<u64>,

    /// Spoken after the startup scan; empty string disables it
    pub welcome_message: Option<String>,
}

/// Startup screen scan
#[derive(Debug, Default, Deserialize)]
pub struct ScreenFileConfig {
    /// Scan the screen at startup
    pub enabled: Option<bool>,

    /// Screenshot command; `{path}` is replaced with the output file
    pub command: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub gemini: Option<String>,
    pub openai: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `GourmetConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> GourmetConfigFile {
    config_file_path().map_or_else(GourmetConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Returns `GourmetConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_from(path: &Path) -> GourmetConfigFile {
    if !path.exists() {
        return GourmetConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                GourmetConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            GourmetConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns `Error::Toml` if the contents are not a valid config file
pub fn parse(content: &str) -> Result<GourmetConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/gourmet/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("gourmet").join("config.toml"))
}
