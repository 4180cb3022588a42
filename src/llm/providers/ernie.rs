use super::{ensure_success, missing, read_json, required, user_message, ProviderAdapter, Requirements};
use crate::llm::{AdapterError, ChatMessage, LlmError, ProviderConfig, ProviderId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErnieRequest {
    messages: Vec<ChatMessage>,
    temperature: f32,
    top_p: f32,
    penalty_score: u32,
    disable_search: bool,
    enable_citation: bool,
    response_format: &'static str,
}

impl ErnieRequest {
    fn new(prompt: &str) -> Self {
        Self {
            messages: user_message(prompt),
            temperature: 0.5,
            top_p: 0.8,
            penalty_score: 1,
            disable_search: false,
            enable_citation: false,
            response_format: "text",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErnieResponse {
    result: Option<String>,
    error_msg: Option<String>,
}

/// Baidu ERNIE: OAuth client-credentials exchange, then the chat call with
/// the access token as a query parameter. The token is fetched on every call.
pub struct ErnieProvider;

impl ErnieProvider {
    async fn access_token(
        &self,
        http: &reqwest::Client,
        config: &ProviderConfig,
    ) -> Result<String, AdapterError> {
        let token_url = required(config.token_url.as_deref(), "token_url")?;
        let client_id = required(config.api_key(), "api_key")?;
        let client_secret = required(config.secret_key.as_deref(), "secret_key")?;

        debug!("Requesting ERNIE access token from {}", token_url);

        let response = http
            .post(token_url)
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let token: TokenResponse = serde_json::from_value(read_json(response).await?)
            .map_err(|e| AdapterError::shape(format!("invalid token response: {}", e)))?;

        match token.access_token.filter(|t| !t.is_empty()) {
            Some(access_token) => Ok(access_token),
            None => Err(AdapterError::shape(format!(
                "no access_token in token response{}",
                token
                    .error_description
                    .map(|d| format!(": {}", d))
                    .unwrap_or_default()
            ))),
        }
    }
}

#[async_trait]
impl ProviderAdapter for ErnieProvider {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Ernie
    }

    fn validate_config(&self, config: &ProviderConfig) -> Result<(), LlmError> {
        // the model is encoded in the endpoint URL
        Requirements {
            api_key: true,
            model: false,
            base_url: true,
        }
        .check(config)?;

        if config.secret_key.is_none() {
            return Err(missing(ProviderId::Ernie, "secret_key"));
        }
        Ok(())
    }

    async fn send(
        &self,
        http: &reqwest::Client,
        config: &ProviderConfig,
        prompt: &str,
    ) -> Result<String, AdapterError> {
        let access_token = self.access_token(http, config).await?;

        let mut url = Url::parse(required(config.base_url(), "base_url")?)?;
        url.query_pairs_mut()
            .append_pair("access_token", &access_token);

        debug!("Sending request to ERNIE");

        let response = http
            .post(url)
            .json(&ErnieRequest::new(prompt))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let body: ErnieResponse = serde_json::from_value(read_json(response).await?)
            .map_err(|e| AdapterError::shape(e.to_string()))?;

        match (body.result, body.error_msg) {
            (Some(result), _) => Ok(result),
            (None, Some(error_msg)) => Err(AdapterError::shape(error_msg)),
            (None, None) => Err(AdapterError::shape("missing 'result' field")),
        }
    }
}
