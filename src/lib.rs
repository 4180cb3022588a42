/// Video Script Generator - multi-provider LLM layer
///
/// Sends one prompt to whichever text-generation backend is configured,
/// normalizes the answer to plain text and retries until the output is usable
/// as a video script or a list of stock-footage search terms.

pub mod config;
pub mod llm;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder};
pub use crate::llm::script::{format_script, generate_script, QUOTA_EXHAUSTED_MARKER};
pub use crate::llm::search_terms::{generate_search_terms, parse_search_terms};
pub use crate::llm::{
    ConfigSource, Dispatcher, GenerationResult, LastAttempt, LlmClient, LlmError, ProviderConfig,
    ProviderId, ProviderRegistry, ScriptOutcome, ScriptRequest, SearchTermsRequest,
    TextGenerator, MAX_RETRIES,
};
