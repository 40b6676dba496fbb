//! User-editable assistant settings
//!
//! Settings live in memory only. The AI client reads them on every call,
//! so an edit applies to the next request without rebuilding anything.

use std::sync::Arc;

use tokio::sync::watch;

use crate::{Error, Result};

/// Default model for extraction and decisions
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Default assistant persona
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a professional food ordering assistant.
1. Analyze user screenshots to extract order history (Restaurant name, Items, Price).
2. Learn user preferences (spicy, vegetarian, etc.).
3. When the user gives a command, suggest the best meal based on history and location.
4. Be concise and helpful.";

/// Model name and system instruction used by the AI client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub model_name: String,
    pub system_instruction: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

/// Shared handle to the current settings
#[derive(Debug, Clone)]
pub struct SettingsStore {
    tx: Arc<watch::Sender<Settings>>,
}

impl SettingsStore {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(settings)),
        }
    }

    /// Settings as of now
    #[must_use]
    pub fn current(&self) -> Settings {
        self.tx.borrow().clone()
    }

    /// Change the model used for extraction and decisions
    ///
    /// # Errors
    ///
    /// Returns error if the name is blank
    pub fn set_model_name(&self, model_name: &str) -> Result<()> {
        let model_name = non_empty("model name", model_name)?;
        self.tx.send_modify(|s| s.model_name = model_name);
        tracing::info!(model = %self.tx.borrow().model_name, "model updated");
        Ok(())
    }

    /// Replace the system instruction sent with decision requests
    ///
    /// # Errors
    ///
    /// Returns error if the instruction is blank
    pub fn set_system_instruction(&self, instruction: &str) -> Result<()> {
        let instruction = non_empty("system instruction", instruction)?;
        self.tx.send_modify(|s| s.system_instruction = instruction);
        tracing::info!("system instruction updated");
        Ok(())
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

fn non_empty(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Settings(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}
