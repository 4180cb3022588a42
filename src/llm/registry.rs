use super::providers::{
    ChatCompletionsProvider, CloudflareProvider, ErnieProvider, GeminiProvider,
    PollinationsProvider, ProviderAdapter, QwenProvider, StreamingChatProvider,
};
use super::{LlmError, ProviderId};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps each provider id to the adapter that speaks its protocol
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    adapters: HashMap<ProviderId, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with an adapter for every [`ProviderId`]
    pub fn with_defaults() -> Self {
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![
            Arc::new(ChatCompletionsProvider::openai()),
            Arc::new(ChatCompletionsProvider::oneapi()),
            Arc::new(ChatCompletionsProvider::azure()),
            Arc::new(ChatCompletionsProvider::moonshot()),
            Arc::new(ChatCompletionsProvider::ollama()),
            Arc::new(ChatCompletionsProvider::deepseek()),
            Arc::new(ChatCompletionsProvider::local()),
            Arc::new(StreamingChatProvider::modelscope()),
            Arc::new(PollinationsProvider),
            Arc::new(ErnieProvider),
            Arc::new(CloudflareProvider),
            Arc::new(QwenProvider),
            Arc::new(GeminiProvider),
        ];

        Self {
            adapters: adapters
                .into_iter()
                .map(|adapter| (adapter.provider_id(), adapter))
                .collect(),
        }
    }

    pub fn register<P>(&mut self, adapter: P) -> Result<(), LlmError>
    where
        P: ProviderAdapter + 'static,
    {
        self.register_shared(Arc::new(adapter))
    }

    pub fn register_shared(&mut self, adapter: Arc<dyn ProviderAdapter>) -> Result<(), LlmError> {
        let provider = adapter.provider_id();
        if self.adapters.contains_key(&provider) {
            return Err(LlmError::configuration(
                provider,
                format!("provider '{}' is already registered", provider),
            ));
        }
        self.adapters.insert(provider, adapter);
        Ok(())
    }

    /// Swap in a different adapter, e.g. a test double
    pub fn replace(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider_id(), adapter);
    }

    pub fn resolve(&self, provider: ProviderId) -> Result<Arc<dyn ProviderAdapter>, LlmError> {
        self.adapters
            .get(&provider)
            .cloned()
            .ok_or_else(|| LlmError::UnsupportedProvider(provider.to_string()))
    }

    pub fn providers(&self) -> Vec<ProviderId> {
        let mut ids: Vec<_> = self.adapters.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
