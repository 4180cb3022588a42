pub mod config;
pub mod dispatcher;
pub mod error;
pub mod providers;
pub mod registry;
pub mod script;
pub mod search_terms;

pub use config::{ConfigSource, ProviderConfig, ProviderId};
pub use dispatcher::Dispatcher;
pub use error::{AdapterError, GenerationResult, LlmError};
pub use registry::ProviderRegistry;
pub use script::{LastAttempt, ScriptOutcome, ScriptRequest};
pub use search_terms::SearchTermsRequest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Attempt cap shared by both call sites
pub const MAX_RETRIES: u32 = 5;

/// Chat message for LLM communication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// Anything that turns a prompt into one generation attempt
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> GenerationResult;
}

/// A dispatcher bound to one resolved provider configuration
#[derive(Clone)]
pub struct LlmClient {
    dispatcher: Arc<Dispatcher>,
    config: ProviderConfig,
}

impl LlmClient {
    pub fn new(dispatcher: Arc<Dispatcher>, config: ProviderConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Resolve the provider config from `source` and bind the default adapters.
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, LlmError> {
        let config = ProviderConfig::resolve(source)?;
        Ok(Self::new(Arc::new(Dispatcher::new()), config))
    }

    pub fn provider(&self) -> ProviderId {
        self.config.provider
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub async fn generate_script(
        &self,
        subject: &str,
        language: Option<&str>,
        paragraph_number: u32,
    ) -> ScriptOutcome {
        let mut request = ScriptRequest::new(subject).with_paragraphs(paragraph_number);
        if let Some(language) = language {
            request = request.with_language(language);
        }
        script::generate_script(self, &request).await
    }

    pub async fn generate_terms(
        &self,
        subject: &str,
        script: &str,
        amount: u32,
    ) -> Result<Vec<String>, LlmError> {
        let request = SearchTermsRequest::new(subject, script).with_amount(amount);
        search_terms::generate_search_terms(self, &request).await
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str) -> GenerationResult {
        self.dispatcher.invoke(&self.config, prompt).await
    }
}
