//! Error types for the provider dispatcher

use super::ProviderId;

/// Failure surfaced by [`super::Dispatcher::invoke`].
///
/// Every variant except [`LlmError::UnsupportedProvider`] carries the provider
/// that produced it so callers can log a uniform `[provider] message` line.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("{provider}: {message}")]
    Configuration { provider: ProviderId, message: String },

    #[error("unsupported llm provider: {0}")]
    UnsupportedProvider(String),

    #[error("[{provider}] request failed: {message}")]
    Transport { provider: ProviderId, message: String },

    #[error("[{provider}] returned an invalid response: {message}")]
    ResponseShape { provider: ProviderId, message: String },
}

impl LlmError {
    pub fn configuration(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::Configuration {
            provider,
            message: message.into(),
        }
    }

    /// Configuration failures cannot succeed on a later attempt.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::UnsupportedProvider(_)
        )
    }

    pub fn provider(&self) -> Option<ProviderId> {
        match self {
            Self::Configuration { provider, .. }
            | Self::Transport { provider, .. }
            | Self::ResponseShape { provider, .. } => Some(*provider),
            Self::UnsupportedProvider(_) => None,
        }
    }
}

/// Error raised inside an adapter before it is tagged with a provider id.
#[derive(thiserror::Error, Debug)]
pub enum AdapterError {
    #[error("{0}")]
    Http(reqwest::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{0}")]
    Stream(String),

    #[error("{0}")]
    Shape(String),

    #[error("{0}")]
    Config(String),
}

// Request URLs can carry credentials in the query (ERNIE token exchange).
impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.without_url())
    }
}

impl AdapterError {
    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }

    /// Attach the provider id, mapping onto the public taxonomy.
    pub fn into_llm_error(self, provider: ProviderId) -> LlmError {
        let message = self.to_string();
        match self {
            Self::Config(_) => LlmError::Configuration { provider, message },
            Self::Shape(_) => LlmError::ResponseShape { provider, message },
            Self::Http(_) | Self::Json(_) | Self::Url(_) | Self::Status { .. } | Self::Stream(_) => {
                LlmError::Transport { provider, message }
            }
        }
    }
}

/// Result of one dispatch: newline-stripped text or a tagged failure.
pub type GenerationResult = std::result::Result<String, LlmError>;
