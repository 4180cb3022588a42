use super::{GenerationResult, LlmError, ProviderConfig, ProviderRegistry};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Routes a prompt to the configured provider's adapter and normalizes the
/// answer. Never retries; that is the caller's job.
pub struct Dispatcher {
    registry: ProviderRegistry,
    http: reqwest::Client,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_registry(ProviderRegistry::with_defaults())
    }

    pub fn with_registry(registry: ProviderRegistry) -> Self {
        Self::with_client(registry, reqwest::Client::new())
    }

    pub fn with_client(registry: ProviderRegistry, http: reqwest::Client) -> Self {
        Self { registry, http }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// One attempt against one backend. Configuration is validated before any
    /// network traffic; the whole call is bounded by `config.timeout`.
    pub async fn invoke(&self, config: &ProviderConfig, prompt: &str) -> GenerationResult {
        let provider = config.provider;
        info!("llm provider: {}", provider);

        let adapter = self.registry.resolve(provider)?;
        adapter.validate_config(config)?;

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            config.timeout,
            adapter.send(&self.http, config, prompt),
        )
        .await;

        match outcome {
            Ok(Ok(text)) => {
                debug!(
                    "{} answered with {} chars in {:.2}s",
                    provider,
                    text.len(),
                    started.elapsed().as_secs_f64()
                );
                Ok(strip_newlines(&text))
            }
            Ok(Err(e)) => {
                let err = e.into_llm_error(provider);
                warn!("{}", err);
                Err(err)
            }
            Err(_) => {
                let err = LlmError::Transport {
                    provider,
                    message: format!("timed out after {:?}", config.timeout),
                };
                warn!("{}", err);
                Err(err)
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove embedded line breaks from a model answer.
pub fn strip_newlines(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '\n' | '\r')).collect()
}
