//! Video script generation with bounded retries

use super::{LlmError, TextGenerator, MAX_RETRIES};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{error, info, warn};

/// Text some free providers return instead of a script once the daily quota is gone
pub const QUOTA_EXHAUSTED_MARKER: &str = "当日额度已消耗完";

static BRACKETED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[.*\]").unwrap());
static PARENTHESIZED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(.*\)").unwrap());

/// What to write a script about
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRequest {
    pub subject: String,
    pub language: Option<String>,
    pub paragraph_number: u32,
}

impl ScriptRequest {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            language: None,
            paragraph_number: 1,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        let language = language.into();
        self.language = (!language.trim().is_empty()).then_some(language);
        self
    }

    pub fn with_paragraphs(mut self, paragraph_number: u32) -> Self {
        self.paragraph_number = paragraph_number;
        self
    }

    /// Instruction prompt sent to the model
    pub fn prompt(&self) -> String {
        let mut prompt = format!(
            r#"# Role: Video Script Generator

## Goals:
Generate a script for a video, depending on the subject of the video.

## Constrains:
1. the script is to be returned as a string with the specified number of paragraphs.
2. do not under any circumstance reference this prompt in your response.
3. get straight to the point, don't start with unnecessary things like, "welcome to this video".
4. you must not include any type of markdown or formatting in the script, never use a title.
5. only return the raw content of the script.
6. do not include "voiceover", "narrator" or similar indicators of what should be spoken at the beginning of each paragraph or line.
7. you must not mention the prompt, or anything about the script itself. also, never talk about the amount of paragraphs or lines. just write the script.
8. respond in the same language as the video subject.

# Initialization:
- video subject: {}
- number of paragraphs: {}"#,
            self.subject, self.paragraph_number
        );
        if let Some(language) = &self.language {
            prompt.push_str(&format!("\n- language: {}", language));
        }
        prompt
    }
}

/// The last thing an exhausted run produced
#[derive(Debug, Clone, PartialEq)]
pub enum LastAttempt {
    Text(String),
    Error(LlmError),
}

/// Result of [`generate_script`]
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptOutcome {
    /// A clean script was produced
    Generated(String),
    /// Every attempt failed; carries the last text or error seen
    Exhausted(LastAttempt),
    /// Every attempt came back empty
    Empty,
    /// The provider is misconfigured; no attempt could reach a backend
    Failed(LlmError),
}

impl ScriptOutcome {
    pub fn is_generated(&self) -> bool {
        matches!(self, ScriptOutcome::Generated(_))
    }

    pub fn script(&self) -> Option<&str> {
        match self {
            ScriptOutcome::Generated(script) => Some(script),
            _ => None,
        }
    }

    /// Flatten to text, rendering errors as `Error: <message>`.
    pub fn into_text(self) -> String {
        match self {
            ScriptOutcome::Generated(text) | ScriptOutcome::Exhausted(LastAttempt::Text(text)) => text,
            ScriptOutcome::Exhausted(LastAttempt::Error(err)) | ScriptOutcome::Failed(err) => {
                format!("Error: {}", err)
            }
            ScriptOutcome::Empty => String::new(),
        }
    }
}

/// Strip markdown residue from a model answer.
pub fn format_script(response: &str) -> String {
    let cleaned = response.replace(['*', '#'], "");
    let cleaned = BRACKETED.replace_all(&cleaned, "");
    let cleaned = PARENTHESIZED.replace_all(&cleaned, "");

    cleaned
        .split("\n\n")
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim()
        .to_string()
}

/// Generate a video script, retrying up to [`MAX_RETRIES`] times until the
/// model returns non-empty text free of the quota marker.
pub async fn generate_script(llm: &dyn TextGenerator, request: &ScriptRequest) -> ScriptOutcome {
    let prompt = request.prompt();
    info!("subject: {}", request.subject);

    let mut last: Option<LastAttempt> = None;

    for attempt in 1..=MAX_RETRIES {
        match llm.generate(&prompt).await {
            Ok(response) if response.trim().is_empty() => {
                error!("llm returned an empty response");
            }
            Ok(response) => {
                let script = format_script(&response);
                if script.contains(QUOTA_EXHAUSTED_MARKER) {
                    error!("failed to generate script: {}", script);
                    last = Some(LastAttempt::Text(script));
                } else if !script.is_empty() {
                    info!("✅ completed: \n{}", script);
                    return ScriptOutcome::Generated(script);
                } else {
                    error!("llm response was empty after formatting");
                }
            }
            Err(err) if err.is_configuration() => {
                error!("failed to generate video script: {}", err);
                return ScriptOutcome::Failed(err);
            }
            Err(err) => {
                error!("failed to generate script: {}", err);
                last = Some(LastAttempt::Error(err));
            }
        }

        if attempt < MAX_RETRIES {
            warn!("failed to generate video script, trying again... {}", attempt);
        }
    }

    match last {
        Some(last) => {
            error!("failed to generate video script after {} attempts", MAX_RETRIES);
            ScriptOutcome::Exhausted(last)
        }
        None => {
            error!("failed to generate video script: every attempt was empty");
            ScriptOutcome::Empty
        }
    }
}
