use super::{
    ensure_success, first_choice_content, read_json, required, user_message, ProviderAdapter,
    Requirements,
};
use crate::llm::{AdapterError, ChatMessage, LlmError, ProviderConfig, ProviderId};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// How a chat-completions backend expects to be authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAuth {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// Azure deployments: `api-key: <key>` plus an `api-version` query
    AzureApiKey,
    /// Local endpoints; a configured key is still sent as a bearer token
    Optional,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enable_thinking: Option<bool>,
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// OpenAI-compatible chat completions (OpenAI, one-api, Moonshot, Ollama,
/// DeepSeek, Azure and the local g4f fallback)
pub struct ChatCompletionsProvider {
    provider: ProviderId,
    auth: ChatAuth,
    requirements: Requirements,
}

impl ChatCompletionsProvider {
    pub fn new(provider: ProviderId, auth: ChatAuth, requirements: Requirements) -> Self {
        Self {
            provider,
            auth,
            requirements,
        }
    }

    pub fn openai() -> Self {
        Self::new(ProviderId::OpenAI, ChatAuth::Bearer, Requirements::ALL)
    }

    pub fn oneapi() -> Self {
        Self::new(ProviderId::OneApi, ChatAuth::Bearer, Requirements::ALL)
    }

    pub fn moonshot() -> Self {
        Self::new(ProviderId::Moonshot, ChatAuth::Bearer, Requirements::ALL)
    }

    pub fn deepseek() -> Self {
        Self::new(ProviderId::DeepSeek, ChatAuth::Bearer, Requirements::ALL)
    }

    pub fn ollama() -> Self {
        Self::new(ProviderId::Ollama, ChatAuth::Optional, Requirements::KEYLESS)
    }

    pub fn azure() -> Self {
        Self::new(ProviderId::Azure, ChatAuth::AzureApiKey, Requirements::ALL)
    }

    /// Local completion server, no credentials
    pub fn local() -> Self {
        Self::new(ProviderId::G4f, ChatAuth::Optional, Requirements::KEYLESS)
    }

    fn endpoint(&self, config: &ProviderConfig) -> Result<Url, AdapterError> {
        let base_url = required(config.base_url(), "base_url")?;
        match self.auth {
            ChatAuth::AzureApiKey => {
                let model = required(config.model(), "model_name")?;
                let api_version = required(config.api_version.as_deref(), "api_version")?;
                let mut url = Url::parse(&format!(
                    "{}/openai/deployments/{}/chat/completions",
                    base_url.trim_end_matches('/'),
                    model
                ))?;
                url.query_pairs_mut().append_pair("api-version", api_version);
                Ok(url)
            }
            ChatAuth::Bearer | ChatAuth::Optional => Ok(Url::parse(&completions_url(base_url))?),
        }
    }
}

#[async_trait]
impl ProviderAdapter for ChatCompletionsProvider {
    fn provider_id(&self) -> ProviderId {
        self.provider
    }

    fn validate_config(&self, config: &ProviderConfig) -> Result<(), LlmError> {
        self.requirements.check(config)
    }

    async fn send(
        &self,
        http: &reqwest::Client,
        config: &ProviderConfig,
        prompt: &str,
    ) -> Result<String, AdapterError> {
        let url = self.endpoint(config)?;
        let request = ChatCompletionRequest {
            model: required(config.model(), "model_name")?,
            messages: user_message(prompt),
            stream: None,
            enable_thinking: None,
        };

        debug!("Sending chat completion to {} at {}", self.provider, url);

        let mut builder = http.post(url).json(&request);
        builder = match (self.auth, config.api_key()) {
            (ChatAuth::AzureApiKey, key) => builder.header("api-key", required(key, "api_key")?),
            (ChatAuth::Bearer, key) => builder.bearer_auth(required(key, "api_key")?),
            (ChatAuth::Optional, Some(key)) => builder.bearer_auth(key),
            (ChatAuth::Optional, None) => builder,
        };

        let response = ensure_success(builder.send().await?).await?;
        first_choice_content(read_json(response).await?)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Extract the text delta carried by one SSE `data:` payload.
fn chunk_delta(data: &str) -> Result<Option<String>, AdapterError> {
    let chunk: ChatCompletionChunk = serde_json::from_str(data)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty()))
}

/// Chat completions over server-sent events (ModelScope). The whole stream is
/// drained before returning.
pub struct StreamingChatProvider {
    provider: ProviderId,
}

impl StreamingChatProvider {
    pub fn modelscope() -> Self {
        Self {
            provider: ProviderId::ModelScope,
        }
    }
}

#[async_trait]
impl ProviderAdapter for StreamingChatProvider {
    fn provider_id(&self) -> ProviderId {
        self.provider
    }

    fn validate_config(&self, config: &ProviderConfig) -> Result<(), LlmError> {
        Requirements::ALL.check(config)
    }

    async fn send(
        &self,
        http: &reqwest::Client,
        config: &ProviderConfig,
        prompt: &str,
    ) -> Result<String, AdapterError> {
        let url = completions_url(required(config.base_url(), "base_url")?);
        let request = ChatCompletionRequest {
            model: required(config.model(), "model_name")?,
            messages: user_message(prompt),
            stream: Some(true),
            enable_thinking: Some(false),
        };

        debug!("Opening completion stream to {} at {}", self.provider, url);

        let response = http
            .post(&url)
            .bearer_auth(required(config.api_key(), "api_key")?)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let mut events = Box::pin(response.bytes_stream().eventsource());
        let mut content = String::new();
        let mut chunks = 0usize;

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| AdapterError::Stream(e.to_string()))?;
            if event.data.trim() == "[DONE]" {
                break;
            }
            chunks += 1;
            if let Some(piece) = chunk_delta(&event.data)? {
                content.push_str(&piece);
            }
        }

        debug!("Drained {} stream chunks from {}", chunks, self.provider);

        if content.trim().is_empty() {
            return Err(AdapterError::shape("empty content in stream response"));
        }
        Ok(content)
    }
}
