//! Gemini REST client

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::AiClient;
use super::api::{
    Content, ErrorResponse, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    Part, SpeechConfig,
};
use super::prompts::{EXTRACTION_PROMPT, decision_prompt};
use super::schema::{history_schema, suggestion_schema};
use crate::config::{Config, DEFAULT_API_BASE_URL, DEFAULT_TTS_MODEL, DEFAULT_TTS_VOICE};
use crate::order::{OrderRecord, Platform, Suggestion};
use crate::screen::ScreenImage;
use crate::settings::SettingsStore;
use crate::{Error, Result};

const JSON_MIME_TYPE: &str = "application/json";

/// Upper bound on a single `generateContent` request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Gemini `generateContent` API
///
/// Model name and system instruction are read from the settings store on
/// every call.
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    settings: SettingsStore,
    tts_model: String,
    tts_voice: String,
}

impl GeminiClient {
    #[must_use]
    pub fn new(api_key: SecretString, settings: SettingsStore) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key,
            settings,
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            tts_voice: DEFAULT_TTS_VOICE.to_string(),
        }
    }

    /// Build from configuration
    ///
    /// # Errors
    ///
    /// Returns error if no Gemini API key is configured
    pub fn from_config(config: &Config, settings: SettingsStore) -> Result<Self> {
        let api_key = config.api_keys.gemini.clone().ok_or_else(|| {
            Error::Config("Gemini API key required (set GEMINI_API_KEY)".to_string())
        })?;

        Ok(Self::new(api_key, settings)
            .with_base_url(&config.ai.base_url)
            .with_voice(&config.ai.tts_model, &config.ai.tts_voice))
    }

    /// Point at a different endpoint (no trailing slash)
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Use a different speech model and prebuilt voice
    #[must_use]
    pub fn with_voice(mut self, tts_model: &str, tts_voice: &str) -> Self {
        self.tts_model = tts_model.to_string();
        self.tts_voice = tts_voice.to_string();
        self
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let url = format!("{}/models/{model}:generateContent", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Ai(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map_or(body, |e| e.error.message);
            return Err(Error::Ai(format!("API error {status}: {message}")));
        }

        Ok(response.json().await?)
    }

    async fn try_extract(&self, image: &ScreenImage) -> Result<Vec<OrderRecord>> {
        let settings = self.settings.current();
        let data = base64::engine::general_purpose::STANDARD.encode(&image.bytes);

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::text(EXTRACTION_PROMPT),
                    Part::inline(image.mime_type.clone(), data),
                ],
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: Some(JSON_MIME_TYPE.to_string()),
                response_schema: Some(history_schema()),
                ..GenerationConfig::default()
            }),
        };

        let response = self.generate(&settings.model_name, &request).await?;
        let text = response
            .text()
            .ok_or_else(|| Error::Ai("empty extraction response".to_string()))?;

        parse_history(&text)
    }

    async fn try_synthesize(&self, text: &str) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content::text(text)],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig::prebuilt(self.tts_voice.clone())),
                ..GenerationConfig::default()
            }),
        };

        let response = self.generate(&self.tts_model, &request).await?;
        response
            .first_inline_data()
            .map(|d| d.data.clone())
            .ok_or_else(|| Error::Ai("no audio in speech response".to_string()))
    }
}

#[async_trait]
impl AiClient for GeminiClient {
    async fn extract_history(&self, image: &ScreenImage) -> Vec<OrderRecord> {
        match self.try_extract(image).await {
            Ok(history) => {
                tracing::info!(orders = history.len(), "order history extracted");
                history
            }
            Err(e) => {
                tracing::warn!(error = %e, "history extraction failed");
                Vec::new()
            }
        }
    }

    async fn decide(
        &self,
        command: &str,
        history: &[OrderRecord],
        location: &str,
    ) -> Result<Suggestion> {
        let settings = self.settings.current();
        let prompt = decision_prompt(command, history, location)
            .map_err(|e| Error::Decision(e.to_string()))?;

        let request = GenerateContentRequest {
            contents: vec![Content::text(prompt)],
            system_instruction: Some(Content::text(settings.system_instruction)),
            generation_config: Some(GenerationConfig {
                response_mime_type: Some(JSON_MIME_TYPE.to_string()),
                response_schema: Some(suggestion_schema()),
                ..GenerationConfig::default()
            }),
        };

        tracing::debug!(model = %settings.model_name, command, "requesting decision");

        let response = self
            .generate(&settings.model_name, &request)
            .await
            .map_err(|e| Error::Decision(e.to_string()))?;
        let text = response
            .text()
            .ok_or_else(|| Error::Decision("empty decision response".to_string()))?;

        parse_suggestion(&text)
    }

    async fn synthesize_speech(&self, text: &str) -> Option<String> {
        match self.try_synthesize(text).await {
            Ok(audio) => Some(audio),
            Err(e) => {
                tracing::warn!(error = %e, "speech synthesis failed");
                None
            }
        }
    }
}

/// Order as the model returns it, before an id is assigned
#[derive(Debug, Deserialize)]
struct ExtractedOrder {
    restaurant: String,
    items: Vec<String>,
    total: f64,
    platform: Platform,
    date: String,
}

/// Parse extraction output, assigning a fresh id to every record
///
/// # Errors
///
/// Returns error if the text is not an array of complete orders
pub fn parse_history(text: &str) -> Result<Vec<OrderRecord>> {
    let orders: Vec<ExtractedOrder> = serde_json::from_str(text.trim())?;

    Ok(orders
        .into_iter()
        .map(|o| OrderRecord {
            id: uuid::Uuid::new_v4().to_string(),
            restaurant: o.restaurant,
            items: o.items,
            total: o.total,
            platform: o.platform,
            date: o.date,
        })
        .collect())
}

/// Parse decision output
///
/// # Errors
///
/// Returns `Error::Decision` if any field is missing or mistyped
pub fn parse_suggestion(text: &str) -> Result<Suggestion> {
    serde_json::from_str(text.trim()).map_err(|e| Error::Decision(format!("invalid suggestion: {e}")))
}
