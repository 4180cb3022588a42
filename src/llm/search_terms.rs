//! Stock-footage search term generation

use super::{LlmError, TextGenerator, MAX_RETRIES};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, error, info, warn};

static JSON_ARRAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[.*\]").unwrap());

/// Subject and script to derive search terms from
#[derive(Debug, Clone, PartialEq)]
pub struct SearchTermsRequest {
    pub subject: String,
    pub script: String,
    pub amount: u32,
}

impl SearchTermsRequest {
    pub fn new(subject: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            script: script.into(),
            amount: 5,
        }
    }

    pub fn with_amount(mut self, amount: u32) -> Self {
        self.amount = amount;
        self
    }

    pub fn prompt(&self) -> String {
        format!(
            r#"# Role: Video Search Terms Generator

## Goals:
Generate {amount} search terms for stock videos, depending on the subject of a video.

## Constrains:
1. the search terms are to be returned as a json-array of strings.
2. each search term should consist of 1-3 words, always add the main subject of the video.
3. you must only return the json-array of strings. you must not return anything else. you must not return the script.
4. the search terms must be related to the subject of the video.
5. reply with english search terms only.

## Output Example:
["search term 1", "search term 2", "search term 3","search term 4","search term 5"]

## Context:
### Video Subject
{subject}

### Video Script
{script}

Please note that you must use English for generating video search terms; Chinese is not accepted."#,
            amount = self.amount,
            subject = self.subject,
            script = self.script,
        )
    }
}

/// Parse a model answer as a JSON array of strings, salvaging the first
/// `[...]` span when the answer has chatter around it.
pub fn parse_search_terms(response: &str) -> Option<Vec<String>> {
    match serde_json::from_str::<Vec<String>>(response.trim()) {
        Ok(terms) => return Some(terms),
        Err(e) => warn!("response is not a JSON array of strings: {}", e),
    }

    let Some(span) = JSON_ARRAY.find(response) else {
        warn!("no JSON array found in response");
        return None;
    };
    debug!("salvaging search terms from: {}", span.as_str());

    match serde_json::from_str::<Vec<String>>(span.as_str()) {
        Ok(terms) => Some(terms),
        Err(e) => {
            warn!("failed to generate video terms: {}", e);
            None
        }
    }
}

/// Ask the model for search terms, retrying up to [`MAX_RETRIES`] times until
/// a non-empty list parses. A dispatch failure is returned immediately; an
/// exhausted run yields an empty list.
pub async fn generate_search_terms(
    llm: &dyn TextGenerator,
    request: &SearchTermsRequest,
) -> Result<Vec<String>, LlmError> {
    let prompt = request.prompt();
    info!("subject: {}", request.subject);

    for attempt in 1..=MAX_RETRIES {
        let response = match llm.generate(&prompt).await {
            Ok(response) => response,
            Err(err) => {
                error!("failed to generate video terms: {}", err);
                return Err(err);
            }
        };

        let terms = parse_search_terms(&response).unwrap_or_default();
        if !terms.is_empty() {
            info!("✅ completed: \n{:?}", terms);
            return Ok(terms);
        }

        if attempt < MAX_RETRIES {
            warn!("failed to generate video terms, trying again... {}", attempt);
        }
    }

    error!("failed to generate video terms after {} attempts", MAX_RETRIES);
    Ok(Vec::new())
}
