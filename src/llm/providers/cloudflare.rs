use super::{ensure_success, missing, read_json, required, ProviderAdapter, Requirements};
use crate::llm::{AdapterError, ChatMessage, LlmError, ProviderConfig, ProviderId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are a friendly assistant";

#[derive(Debug, Serialize)]
struct CloudflareRequest {
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct CloudflareResponse {
    result: Option<CloudflareResult>,
    #[serde(default)]
    errors: Vec<CloudflareMessage>,
}

#[derive(Debug, Deserialize)]
struct CloudflareResult {
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloudflareMessage {
    message: String,
}

/// Cloudflare Workers AI `ai/run` endpoint
pub struct CloudflareProvider;

#[async_trait]
impl ProviderAdapter for CloudflareProvider {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Cloudflare
    }

    fn validate_config(&self, config: &ProviderConfig) -> Result<(), LlmError> {
        Requirements::ALL.check(config)?;
        if config.account_id.is_none() {
            return Err(missing(ProviderId::Cloudflare, "account_id"));
        }
        Ok(())
    }

    async fn send(
        &self,
        http: &reqwest::Client,
        config: &ProviderConfig,
        prompt: &str,
    ) -> Result<String, AdapterError> {
        let url = format!(
            "{}/accounts/{}/ai/run/{}",
            required(config.base_url(), "base_url")?.trim_end_matches('/'),
            required(config.account_id.as_deref(), "account_id")?,
            required(config.model(), "model_name")?,
        );
        let request = CloudflareRequest {
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
        };

        debug!("Sending request to Cloudflare Workers AI at {}", url);

        let response = http
            .post(&url)
            .bearer_auth(required(config.api_key(), "api_key")?)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let body: CloudflareResponse = serde_json::from_value(read_json(response).await?)
            .map_err(|e| AdapterError::shape(e.to_string()))?;

        if let Some(text) = body.result.and_then(|r| r.response) {
            return Ok(text);
        }
        let reason = body
            .errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");
        Err(AdapterError::shape(if reason.is_empty() {
            "missing 'result.response' field".to_string()
        } else {
            reason
        }))
    }
}
