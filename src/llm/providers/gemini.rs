use super::{ensure_success, read_json, required, ProviderAdapter, Requirements};
use crate::llm::{AdapterError, LlmError, ProviderConfig, ProviderId};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

const PROMPT_PREVIEW_CHARS: usize = 1000;

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            top_p: 1.0,
            top_k: 1,
            max_output_tokens: 2048,
        }
    }
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

impl<'a> GeminiRequest<'a> {
    fn new(prompt: &'a str) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GenerationConfig::default(),
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: "BLOCK_ONLY_HIGH",
                })
                .collect(),
        }
    }
}

/// A named place where generated text may live in a response
struct TextRule {
    name: &'static str,
    extract: fn(&Value) -> Option<&str>,
}

fn candidate_parts(response: &Value) -> Option<&str> {
    response.pointer("/candidates/0/content/parts/0/text")?.as_str()
}

fn candidate_string_list(response: &Value) -> Option<&str> {
    response
        .pointer("/candidates/0/content")?
        .as_array()?
        .first()?
        .as_str()
}

fn candidate_text(response: &Value) -> Option<&str> {
    response.pointer("/candidates/0/content/text")?.as_str()
}

fn top_level_text(response: &Value) -> Option<&str> {
    response.get("text")?.as_str()
}

fn top_level_output_text(response: &Value) -> Option<&str> {
    response.get("output_text")?.as_str()
}

/// Tried strictly in this order; the first non-empty match wins.
const TEXT_RULES: [TextRule; 5] = [
    TextRule {
        name: "candidates[0].content.parts[0].text",
        extract: candidate_parts,
    },
    TextRule {
        name: "candidates[0].content[0]",
        extract: candidate_string_list,
    },
    TextRule {
        name: "candidates[0].content.text",
        extract: candidate_text,
    },
    TextRule {
        name: "text",
        extract: top_level_text,
    },
    TextRule {
        name: "output_text",
        extract: top_level_output_text,
    },
];

/// Locate the generated text in a Gemini response, whatever shape it took.
pub fn extract_gemini_text(response: &Value) -> Option<&str> {
    TEXT_RULES.iter().find_map(|rule| {
        let text = (rule.extract)(response).filter(|t| !t.is_empty())?;
        debug!("gemini: extracted from {}", rule.name);
        Some(text)
    })
}

/// Show only the edges of a secret.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    match chars.len() {
        0 => "<empty>".to_string(),
        n if n <= 8 => {
            let visible = n.min(2);
            let tail: String = chars[n - visible..].iter().collect();
            format!("{}{}", "*".repeat(n - visible), tail)
        }
        n => {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[n - 4..].iter().collect();
            format!("{}{}{}", head, "*".repeat(n - 8), tail)
        }
    }
}

fn prompt_preview(prompt: &str) -> String {
    if prompt.chars().count() <= PROMPT_PREVIEW_CHARS {
        prompt.to_string()
    } else {
        let head: String = prompt.chars().take(PROMPT_PREVIEW_CHARS).collect();
        format!("{}...[truncated]", head)
    }
}

/// Google Gemini `generateContent`
pub struct GeminiProvider;

impl GeminiProvider {
    fn endpoint(config: &ProviderConfig) -> Result<Url, AdapterError> {
        let base_url = required(config.base_url(), "base_url")?.trim_end_matches('/');
        let model = required(config.model(), "model_name")?;
        let model = model.strip_prefix("models/").unwrap_or(model);

        Ok(Url::parse(&format!("{}/models/{}:generateContent", base_url, model))?)
    }
}

#[async_trait]
impl ProviderAdapter for GeminiProvider {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    fn validate_config(&self, config: &ProviderConfig) -> Result<(), LlmError> {
        Requirements::ALL.check(config)
    }

    async fn send(
        &self,
        http: &reqwest::Client,
        config: &ProviderConfig,
        prompt: &str,
    ) -> Result<String, AdapterError> {
        let url = Self::endpoint(config)?;
        let request = GeminiRequest::new(prompt);

        info!("gemini: calling model");
        debug!(
            "gemini: model_name={}, base_url={}, api_key_mask={}",
            config.model().unwrap_or_default(),
            config.base_url().unwrap_or_default(),
            mask_key(config.api_key().unwrap_or_default())
        );
        debug!("gemini: generation_config={:?}", request.generation_config);
        debug!("gemini: prompt_preview={}", prompt_preview(prompt));

        let response = http
            .post(url)
            .header("x-goog-api-key", required(config.api_key(), "api_key")?)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let body = read_json(response).await?;

        if let Some(text) = extract_gemini_text(&body) {
            return Ok(text.to_string());
        }

        let block_reason = body
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str);
        warn!("gemini: no text found in response object");
        Err(AdapterError::shape(match block_reason {
            Some(reason) => format!("no text in response (blocked: {})", reason),
            None => "no text in response".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_from_structured_parts() {
        let response = json!({
            "candidates": [{"content": {"parts": [{"text": "from parts"}], "text": "ignored"}}],
            "text": "ignored too"
        });
        assert_eq!(extract_gemini_text(&response), Some("from parts"));
    }

    #[test]
    fn test_extract_from_string_list() {
        let response = json!({"candidates": [{"content": ["first", "second"]}]});
        assert_eq!(extract_gemini_text(&response), Some("first"));
    }

    #[test]
    fn test_extract_from_content_text() {
        let response = json!({"candidates": [{"content": {"text": "plain"}}], "output_text": "late"});
        assert_eq!(extract_gemini_text(&response), Some("plain"));
    }

    #[test]
    fn test_extract_falls_back_to_top_level_fields() {
        let response = json!({"candidates": [], "text": "top"});
        assert_eq!(extract_gemini_text(&response), Some("top"));

        let response = json!({"text": "", "output_text": "output"});
        assert_eq!(extract_gemini_text(&response), Some("output"));
    }

    #[test]
    fn test_extract_skips_empty_parts() {
        let response = json!({
            "candidates": [{"content": {"parts": [{"text": ""}]}}],
            "output_text": "fallback"
        });
        assert_eq!(extract_gemini_text(&response), Some("fallback"));
    }

    #[test]
    fn test_extract_gives_up_on_unknown_shape() {
        let response = json!({"candidates": [{"content": {"parts": [{"inlineData": {}}]}}]});
        assert_eq!(extract_gemini_text(&response), None);
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key(""), "<empty>");
        assert_eq!(mask_key("abcdef"), "****ef");
        assert_eq!(mask_key("AIzaSyExampleKey1234"), "AIza************1234");
    }

    #[test]
    fn test_endpoint() {
        let config = ProviderConfig::new(ProviderId::Gemini)
            .with_api_key("k")
            .with_model("models/gemini-1.5-flash")
            .with_base_url("https://generativelanguage.googleapis.com/v1beta/");
        let url = GeminiProvider::endpoint(&config).unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_request_shape() {
        let json = serde_json::to_value(GeminiRequest::new("hi")).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2048);
        assert_eq!(json["safetySettings"].as_array().unwrap().len(), 4);
        assert_eq!(json["safetySettings"][0]["threshold"], "BLOCK_ONLY_HIGH");
    }
}
