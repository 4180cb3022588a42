use super::{ensure_success, read_json, required, user_message, ProviderAdapter, Requirements};
use crate::llm::{AdapterError, ChatMessage, LlmError, ProviderConfig, ProviderId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct DashScopeRequest<'a> {
    model: &'a str,
    input: DashScopeInput,
}

#[derive(Debug, Serialize)]
struct DashScopeInput {
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct DashScopeResponse {
    output: Option<DashScopeOutput>,
}

#[derive(Debug, Deserialize)]
struct DashScopeOutput {
    text: Option<String>,
}

/// Alibaba Qwen through the DashScope text-generation API
pub struct QwenProvider;

#[async_trait]
impl ProviderAdapter for QwenProvider {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Qwen
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
        let url = required(config.base_url(), "base_url")?;
        let request = DashScopeRequest {
            model: required(config.model(), "model_name")?,
            input: DashScopeInput {
                messages: user_message(prompt),
            },
        };

        debug!("Sending request to DashScope at {}", url);

        let response = http
            .post(url)
            .bearer_auth(required(config.api_key(), "api_key")?)
            .json(&request)
            .send()
            .await?;
        // DashScope puts its error code and message in the body of non-2xx replies
        let response = ensure_success(response).await?;

        let body = read_json(response).await?;
        let parsed: DashScopeResponse = serde_json::from_value(body)
            .map_err(|e| AdapterError::shape(e.to_string()))?;

        parsed
            .output
            .and_then(|output| output.text)
            .ok_or_else(|| AdapterError::shape("missing 'output.text' field"))
    }
}
