//! Backend adapters, one per provider family

mod cloudflare;
mod ernie;
mod gemini;
mod openai;
mod pollinations;
mod qwen;

pub use cloudflare::CloudflareProvider;
pub use ernie::ErnieProvider;
pub use gemini::{extract_gemini_text, GeminiProvider};
pub use openai::{ChatAuth, ChatCompletionsProvider, StreamingChatProvider};
pub use pollinations::PollinationsProvider;
pub use qwen::QwenProvider;

use super::{AdapterError, ChatMessage, LlmError, ProviderConfig, ProviderId};
use async_trait::async_trait;
use serde::Deserialize;

/// Strategy translating a prompt into one backend's transport protocol
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider_id(&self) -> ProviderId;

    /// Check the config before any network traffic happens.
    fn validate_config(&self, config: &ProviderConfig) -> Result<(), LlmError>;

    /// Perform the backend call and return the raw (not yet normalized) text.
    async fn send(
        &self,
        http: &reqwest::Client,
        config: &ProviderConfig,
        prompt: &str,
    ) -> Result<String, AdapterError>;
}

/// Which of the common fields an adapter needs before it may call out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirements {
    pub api_key: bool,
    pub model: bool,
    pub base_url: bool,
}

impl Requirements {
    pub const ALL: Requirements = Requirements {
        api_key: true,
        model: true,
        base_url: true,
    };

    /// Keyless backends still need a model and somewhere to send it
    pub const KEYLESS: Requirements = Requirements {
        api_key: false,
        model: true,
        base_url: true,
    };

    pub fn check(&self, config: &ProviderConfig) -> Result<(), LlmError> {
        let fields = [
            (self.api_key, config.api_key(), "api_key"),
            (self.model, config.model(), "model_name"),
            (self.base_url, config.base_url(), "base_url"),
        ];
        for (required, value, name) in fields {
            if required && value.is_none() {
                return Err(missing(config.provider, name));
            }
        }
        Ok(())
    }
}

pub(crate) fn missing(provider: ProviderId, field: &str) -> LlmError {
    LlmError::configuration(
        provider,
        format!(
            "{} is not set, please set it in the config.toml file.",
            field
        ),
    )
}

/// Borrow a field `validate_config` already checked.
pub(crate) fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, AdapterError> {
    value.ok_or_else(|| AdapterError::Config(format!("{} is not set", field)))
}

pub(crate) fn user_message(prompt: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(prompt)]
}

/// Turn a non-2xx response into an error carrying the body.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AdapterError::Status { status, body })
}

/// Read the whole body as JSON; malformed bodies are transport failures.
pub(crate) async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, AdapterError> {
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// OpenAI-style completion envelope shared by several backends
#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionChoice {
    pub message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionMessage {
    pub content: Option<String>,
}

/// Pull `choices[0].message.content` out of a decoded body.
pub(crate) fn first_choice_content(body: serde_json::Value) -> Result<String, AdapterError> {
    let completion: ChatCompletionResponse = serde_json::from_value(body)
        .map_err(|e| AdapterError::shape(format!("not a chat completion: {}", e)))?;

    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AdapterError::shape("no choices in completion"))
}
