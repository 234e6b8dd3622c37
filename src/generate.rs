//! Answer generation.
//!
//! [`LanguageModel`] is the capability seam: one prompt in, one completion
//! out, with failures classified for the retry loop. Two clients are
//! provided:
//! - **[`ChatCompletionsModel`]**: OpenAI-compatible `/chat/completions`
//!   (Groq by default, or OpenAI).
//! - **[`OllamaModel`]**: a local Ollama instance's `/api/chat`.
//!
//! [`Generator`] wraps a model with the retry policy and always decodes at
//! temperature 0.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result as AnyResult};
use async_trait::async_trait;
use tracing::info;

use crate::config::LlmConfig;
use crate::error::{self, CapabilityError, ErrorClass, RagError};
use crate::models::Answer;
use crate::retry::{with_retry, RetryPolicy};

/// Decoding temperature for every completion.
pub const TEMPERATURE: f32 = 0.0;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Turns a prompt into text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;
    /// Make one completion attempt.
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, CapabilityError>;
}

/// Create the configured [`LanguageModel`].
///
/// | Config Value | Client | Default key variable |
/// |-------------|--------|----------------------|
/// | `"groq"` | [`ChatCompletionsModel`] | `GROQ_API_KEY` |
/// | `"openai"` | [`ChatCompletionsModel`] | `OPENAI_API_KEY` |
/// | `"ollama"` | [`OllamaModel`] | none |
pub fn create_model(config: &LlmConfig) -> AnyResult<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "groq" => Ok(Arc::new(ChatCompletionsModel::new(
            config,
            GROQ_BASE_URL,
            "GROQ_API_KEY",
        )?)),
        "openai" => Ok(Arc::new(ChatCompletionsModel::new(
            config,
            OPENAI_BASE_URL,
            "OPENAI_API_KEY",
        )?)),
        "ollama" => Ok(Arc::new(OllamaModel::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

fn http_client(timeout_secs: u64) -> AnyResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

// ============ Chat Completions ============

/// Client for OpenAI-compatible chat completion APIs.
///
/// Calls `POST {url}/chat/completions` with the prompt as a single user
/// message. The API key is read from the environment at construction time.
pub struct ChatCompletionsModel {
    model: String,
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl ChatCompletionsModel {
    pub fn new(config: &LlmConfig, default_url: &str, default_key_env: &str) -> AnyResult<Self> {
        let key_env = config.api_key_env.as_deref().unwrap_or(default_key_env);
        let api_key = std::env::var(key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", key_env))?;
        if api_key.trim().is_empty() {
            bail!("{} environment variable is empty", key_env);
        }
        let url = config.url.as_deref().unwrap_or(default_url);

        Ok(Self {
            model: config.model.clone(),
            url: url.trim_end_matches('/').to_string(),
            api_key,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, CapabilityError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": temperature,
            "stream": false,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CapabilityError::from_status(
                status,
                format!("chat completion error {}: {}", status, body_text),
            ));
        }

        let json: serde_json::Value = response.json().await?;
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String, CapabilityError> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| CapabilityError::fatal("Invalid chat response: missing message content"))
}

// ============ Ollama ============

/// Client for a local Ollama instance.
///
/// Calls `POST /api/chat` (default base `http://localhost:11434`); no
/// credential is needed.
pub struct OllamaModel {
    model: String,
    url: String,
    client: reqwest::Client,
}

impl OllamaModel {
    pub fn new(config: &LlmConfig) -> AnyResult<Self> {
        let url = config.url.as_deref().unwrap_or(OLLAMA_BASE_URL);
        Ok(Self {
            model: config.model.clone(),
            url: url.trim_end_matches('/').to_string(),
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, CapabilityError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "options": { "temperature": temperature },
            "stream": false,
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CapabilityError::from_status(
                status,
                format!("Ollama API error {}: {}", status, body_text),
            ));
        }

        let json: serde_json::Value = response.json().await?;
        json.pointer("/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| CapabilityError::fatal("Invalid Ollama response: missing message content"))
    }
}

// ============ Generator ============

/// Sends rendered prompts to a [`LanguageModel`] under a retry policy.
pub struct Generator {
    model: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
}

impl Generator {
    /// Uses the generation retry budget: throttling up to 5 retries,
    /// transport failures once.
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            retry: RetryPolicy {
                transport_retries: 1,
                timeout: Duration::from_secs(60),
                ..RetryPolicy::default()
            },
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Complete `prompt` at temperature 0 and return the full answer text.
    ///
    /// `sources` on the returned [`Answer`] is empty; the pipeline fills it
    /// from the retrieval result.
    pub async fn generate(&self, prompt: &str) -> error::Result<Answer> {
        let text = with_retry(&self.retry, "completion", || {
            self.model.complete(prompt, TEMPERATURE)
        })
        .await
        .map_err(|e| {
            let kind = match e.class {
                ErrorClass::Fatal => "request rejected",
                ErrorClass::RateLimited => "rate limited",
                ErrorClass::Transport => "transport failure",
            };
            RagError::Generation(format!("{} ({}): {}", kind, self.model.model_name(), e))
        })?;

        info!(
            model = self.model.model_name(),
            chars = text.chars().count(),
            "generated answer"
        );
        Ok(Answer {
            text,
            sources: Vec::new(),
        })
    }
}
