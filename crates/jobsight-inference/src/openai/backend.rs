//! OpenAI-compatible classifier implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::{debug, info, warn};

use jobsight_core::defaults::{
    CLASSIFIER_BASE_URL, CLASSIFIER_MODEL, CLASSIFIER_TEMPERATURE, CLASSIFIER_TIMEOUT_SECS,
};
use jobsight_core::{Classifier, Enrichment, Error, RawRecord, Result};

use super::error::{to_jobsight_error, OpenAIErrorCode};
use super::types::*;
use crate::prompts::{batch_prompt, parse_enrichments, system_prompt};

/// Configuration for the OpenAI-compatible classifier.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Chat model used for classification.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Sampling temperature.
    pub temperature: f32,
}

impl OpenAIConfig {
    /// Config for the default endpoint and model with the given key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: CLASSIFIER_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: CLASSIFIER_MODEL.to_string(),
            timeout_seconds: CLASSIFIER_TIMEOUT_SECS,
            temperature: CLASSIFIER_TEMPERATURE,
        }
    }

    /// Load from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `CLASSIFIER_BASE_URL` | Gemini OpenAI-compatible endpoint | API base |
    /// | `CLASSIFIER_API_KEY` | (required) | Bearer token |
    /// | `CLASSIFIER_MODEL` | `gemini-1.5-flash` | Chat model |
    /// | `CLASSIFIER_TIMEOUT_SECS` | `60` | HTTP timeout |
    ///
    /// A missing or blank API key is a configuration error.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("CLASSIFIER_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("CLASSIFIER_API_KEY is not set".to_string()))?;

        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("CLASSIFIER_BASE_URL") {
            if !url.trim().is_empty() {
                config.base_url = url.trim().to_string();
            }
        }
        if let Ok(model) = std::env::var("CLASSIFIER_MODEL") {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        config.timeout_seconds = std::env::var("CLASSIFIER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(CLASSIFIER_TIMEOUT_SECS);
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout_seconds(mut self, secs: u64) -> Self {
        self.timeout_seconds = secs;
        self
    }
}

/// Job-posting classifier over an OpenAI-compatible chat completion API.
pub struct OpenAIClassifier {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIClassifier {
    /// Create a classifier with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "classifier",
            base_url = %config.base_url,
            model = %config.model,
            timeout_secs = config.timeout_seconds,
            "Initializing classifier"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env()?)
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Build a request with authentication.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        self.client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: Some(self.config.temperature),
            max_tokens: None,
            stream: false,
        };

        let response = self
            .build_request("/chat/completions")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Classifier(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (error_type, message) = match serde_json::from_str::<OpenAIErrorBody>(&body)
                .ok()
                .and_then(OpenAIErrorBody::into_error)
            {
                Some(e) => (e.error_type, e.message),
                None => ("unknown".to_string(), format!("HTTP {}", status)),
            };
            let code = OpenAIErrorCode::from_response(status.as_u16(), &error_type);
            warn!(
                subsystem = "inference",
                component = "classifier",
                status = status.as_u16(),
                error_type = %error_type,
                retryable = code.is_retryable(),
                "Classifier returned an error"
            );
            return Err(to_jobsight_error(code, &message));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Classifier(format!("Failed to parse response: {}", e)))?;

        if let Some(usage) = &result.usage {
            debug!(
                subsystem = "inference",
                component = "classifier",
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Classifier token usage"
            );
        }

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Classifier("Response had no choices".to_string()))
    }
}

#[async_trait]
impl Classifier for OpenAIClassifier {
    async fn classify(&self, batch: &[RawRecord]) -> Result<Vec<Enrichment>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(system_prompt()),
            ChatMessage::user(batch_prompt(batch)?),
        ];
        let content = self.complete(messages).await?;

        let analyzed_at = Utc::now();
        let mut enrichments = parse_enrichments(&content)?;
        for enrichment in &mut enrichments {
            enrichment.model = self.config.model.clone();
            enrichment.analyzed_at = analyzed_at;
        }

        debug!(
            subsystem = "inference",
            component = "classifier",
            op = "classify",
            record_count = batch.len(),
            enrichment_count = enrichments.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch classified"
        );
        Ok(enrichments)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
