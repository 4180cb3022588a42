use super::{ensure_success, first_choice_content, read_json, required, user_message, ProviderAdapter};
use crate::llm::{AdapterError, ChatMessage, LlmError, ProviderConfig, ProviderId};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

/// Fixed sampling seed so identical prompts give reproducible output
const POLLINATIONS_SEED: u64 = 101;

#[derive(Debug, Serialize)]
struct PollinationsRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    seed: u64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    referrer: Option<&'a str>,
}

/// Open Pollinations text endpoint, no credentials
pub struct PollinationsProvider;

#[async_trait]
impl ProviderAdapter for PollinationsProvider {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Pollinations
    }

    fn validate_config(&self, _config: &ProviderConfig) -> Result<(), LlmError> {
        // endpoint and model both fall back to built-in defaults
        Ok(())
    }

    async fn send(
        &self,
        http: &reqwest::Client,
        config: &ProviderConfig,
        prompt: &str,
    ) -> Result<String, AdapterError> {
        let provider = ProviderId::Pollinations;
        let url = required(config.base_url().or(provider.default_base_url()), "base_url")?;
        let model = required(config.model().or(provider.default_model()), "model_name")?;

        let request = PollinationsRequest {
            model,
            messages: user_message(prompt),
            seed: POLLINATIONS_SEED,
            private: config.private,
            referrer: config.referrer.as_deref(),
        };

        debug!("Sending request to Pollinations at {}", url);

        let response = http
            .post(url)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        first_choice_content(read_json(response).await?)
    }
}
