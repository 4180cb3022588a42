//! Provider identifiers and per-call provider configuration

use super::LlmError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default per-attempt timeout when `llm_timeout_seconds` is not configured.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";
const DEFAULT_ERNIE_TOKEN_URL: &str = "https://aip.baidubce.com/oauth/2.0/token";

/// Supported text-generation backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenAI,
    OneApi,
    Azure,
    Moonshot,
    Ollama,
    DeepSeek,
    ModelScope,
    Pollinations,
    Ernie,
    Cloudflare,
    Qwen,
    Gemini,
    G4f,
}

impl ProviderId {
    pub const ALL: [ProviderId; 13] = [
        ProviderId::OpenAI,
        ProviderId::OneApi,
        ProviderId::Azure,
        ProviderId::Moonshot,
        ProviderId::Ollama,
        ProviderId::DeepSeek,
        ProviderId::ModelScope,
        ProviderId::Pollinations,
        ProviderId::Ernie,
        ProviderId::Cloudflare,
        ProviderId::Qwen,
        ProviderId::Gemini,
        ProviderId::G4f,
    ];

    /// Identifier used as configuration key prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "openai",
            ProviderId::OneApi => "oneapi",
            ProviderId::Azure => "azure",
            ProviderId::Moonshot => "moonshot",
            ProviderId::Ollama => "ollama",
            ProviderId::DeepSeek => "deepseek",
            ProviderId::ModelScope => "modelscope",
            ProviderId::Pollinations => "pollinations",
            ProviderId::Ernie => "ernie",
            ProviderId::Cloudflare => "cloudflare",
            ProviderId::Qwen => "qwen",
            ProviderId::Gemini => "gemini",
            ProviderId::G4f => "g4f",
        }
    }

    /// Endpoint used when `<provider>_base_url` is not configured
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            ProviderId::OpenAI => Some("https://api.openai.com/v1"),
            ProviderId::Moonshot => Some("https://api.moonshot.cn/v1"),
            ProviderId::Ollama => Some("http://localhost:11434/v1"),
            ProviderId::DeepSeek => Some("https://api.deepseek.com"),
            ProviderId::ModelScope => Some("https://api-inference.modelscope.cn/v1/"),
            ProviderId::Pollinations => Some("https://text.pollinations.ai/openai"),
            ProviderId::Cloudflare => Some("https://api.cloudflare.com/client/v4"),
            ProviderId::Qwen => Some(
                "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation",
            ),
            ProviderId::Gemini => Some("https://generativelanguage.googleapis.com/v1beta"),
            ProviderId::G4f => Some("http://localhost:1337/v1"),
            ProviderId::OneApi | ProviderId::Azure | ProviderId::Ernie => None,
        }
    }

    /// Model used when `<provider>_model_name` is not configured
    pub fn default_model(&self) -> Option<&'static str> {
        match self {
            ProviderId::Pollinations => Some("openai-fast"),
            ProviderId::G4f => Some("gpt-3.5-turbo-16k-0613"),
            _ => None,
        }
    }

    /// Placeholder key for backends that demand one but never check it
    pub fn default_api_key(&self) -> Option<&'static str> {
        match self {
            ProviderId::Ollama => Some("ollama"),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ProviderId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| LlmError::UnsupportedProvider(s.trim().to_string()))
    }
}

/// Read-only key lookup against the externally owned configuration.
///
/// Implementations return `None` for absent keys; blank values are treated
/// as absent by [`ProviderConfig::resolve`].
pub trait ConfigSource {
    fn lookup(&self, key: &str) -> Option<String>;
}

impl ConfigSource for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl ConfigSource for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Everything one adapter call needs, resolved once per request
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub provider: ProviderId,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Ernie OAuth client secret
    pub secret_key: Option<String>,
    /// Cloudflare account id
    pub account_id: Option<String>,
    /// Azure API version
    pub api_version: Option<String>,
    /// Ernie OAuth token endpoint
    pub token_url: Option<String>,
    /// Pollinations private flag
    pub private: bool,
    /// Pollinations referrer
    pub referrer: Option<String>,
    /// Per-attempt timeout
    pub timeout: Duration,
}

impl ProviderConfig {
    /// Config carrying only the provider's built-in defaults
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            api_key: provider.default_api_key().map(str::to_string),
            model: provider.default_model().map(str::to_string),
            base_url: provider.default_base_url().map(str::to_string),
            secret_key: None,
            account_id: None,
            api_version: (provider == ProviderId::Azure)
                .then(|| DEFAULT_AZURE_API_VERSION.to_string()),
            token_url: (provider == ProviderId::Ernie)
                .then(|| DEFAULT_ERNIE_TOKEN_URL.to_string()),
            private: false,
            referrer: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }

    /// Resolve the provider named by `llm_provider` (default `openai`) and its
    /// `<provider>_*` keys from a configuration source.
    pub fn resolve(source: &dyn ConfigSource) -> Result<Self, LlmError> {
        let provider = match lookup(source, "llm_provider") {
            Some(name) => name.parse()?,
            None => ProviderId::OpenAI,
        };
        Self::resolve_for(provider, source)
    }

    /// Resolve a specific provider's keys, ignoring `llm_provider`
    pub fn resolve_for(provider: ProviderId, source: &dyn ConfigSource) -> Result<Self, LlmError> {
        let key = |field: &str| lookup(source, &format!("{}_{}", provider.as_str(), field));
        let mut config = Self::new(provider);

        if let Some(api_key) = key("api_key") {
            config.api_key = Some(api_key);
        }
        if let Some(model) = key("model_name") {
            config.model = Some(model);
        }
        if let Some(base_url) = key("base_url") {
            config.base_url = Some(base_url);
        }
        if let Some(api_version) = key("api_version") {
            config.api_version = Some(api_version);
        }
        if let Some(token_url) = key("token_url") {
            config.token_url = Some(token_url);
        }
        config.secret_key = key("secret_key");
        config.account_id = key("account_id");
        config.referrer = key("referrer");
        config.private = key("private").is_some_and(|v| is_truthy(&v));

        if let Some(raw) = lookup(source, "llm_timeout_seconds") {
            let seconds: u64 = raw.parse().map_err(|_| {
                LlmError::configuration(
                    provider,
                    format!("llm_timeout_seconds must be a positive integer, got '{}'", raw),
                )
            })?;
            if seconds == 0 {
                return Err(LlmError::configuration(
                    provider,
                    "llm_timeout_seconds must be greater than 0",
                ));
            }
            config.timeout = Duration::from_secs(seconds);
        }

        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = Some(token_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn without_api_key(mut self) -> Self {
        self.api_key = None;
        self
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }
}

fn lookup(source: &dyn ConfigSource, key: &str) -> Option<String> {
    source
        .lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
