use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use video_script_gen::llm::providers::ProviderAdapter;
use video_script_gen::llm::{AdapterError, ProviderRegistry};
use video_script_gen::{Dispatcher, LlmError, ProviderConfig, ProviderId};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROMPT: &str = "Write about the ocean";

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}

async fn mount_completion(server: &MockServer, route: &str, content: &str) {
    Mock::given(method("POST"))
        .and(path(route))
        .and(body_partial_json(json!({"messages": [{"role": "user", "content": PROMPT}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(content)))
        .expect(1)
        .mount(server)
        .await;
}

fn assert_normalized(text: &str, expected: &str) {
    assert_eq!(text, expected);
    assert!(!text.contains('\n'));
}

#[tokio::test]
async fn test_openai_compatible_providers() {
    for provider in [
        ProviderId::OpenAI,
        ProviderId::OneApi,
        ProviderId::Moonshot,
        ProviderId::DeepSeek,
    ] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "test-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Deep\nblue\nsea")))
            .expect(1)
            .mount(&server)
            .await;

        let config = ProviderConfig::new(provider)
            .with_api_key("sk-test")
            .with_model("test-model")
            .with_base_url(format!("{}/v1", server.uri()));

        let text = Dispatcher::new().invoke(&config, PROMPT).await.unwrap();
        assert_normalized(&text, "Deepbluesea");
    }
}

#[tokio::test]
async fn test_ollama_and_local_fallback_need_no_real_key() {
    let server = MockServer::start().await;
    mount_completion(&server, "/v1/chat/completions", "local\nanswer").await;
    let ollama = ProviderConfig::new(ProviderId::Ollama)
        .with_model("llama3")
        .with_base_url(format!("{}/v1", server.uri()));
    let text = Dispatcher::new().invoke(&ollama, PROMPT).await.unwrap();
    assert_normalized(&text, "localanswer");

    let server = MockServer::start().await;
    mount_completion(&server, "/v1/chat/completions", "offline").await;
    let g4f = ProviderConfig::new(ProviderId::G4f).with_base_url(format!("{}/v1", server.uri()));
    assert_eq!(g4f.api_key(), None);
    let text = Dispatcher::new().invoke(&g4f, PROMPT).await.unwrap();
    assert_normalized(&text, "offline");
}

#[tokio::test]
async fn test_azure_uses_deployment_url_and_api_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/deployments/gpt-35/chat/completions"))
        .and(query_param("api-version", "2024-02-15-preview"))
        .and(header("api-key", "az-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("azure\ntext")))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::Azure)
        .with_api_key("az-key")
        .with_model("gpt-35")
        .with_base_url(server.uri());

    let text = Dispatcher::new().invoke(&config, PROMPT).await.unwrap();
    assert_normalized(&text, "azuretext");
}

fn sse_body(pieces: &[&str]) -> String {
    let mut body = String::new();
    body.push_str("data: {\"choices\":[]}\n\n");
    for piece in pieces {
        let chunk = json!({"choices": [{"index": 0, "delta": {"content": piece}}]});
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

#[tokio::test]
async fn test_modelscope_stream_is_drained_and_concatenated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true, "enable_thinking": false})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["Waves ", "crash\n", "ashore"]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::ModelScope)
        .with_api_key("ms-key")
        .with_model("Qwen/Qwen3-8B")
        .with_base_url(format!("{}/v1/", server.uri()));

    let text = Dispatcher::new().invoke(&config, PROMPT).await.unwrap();
    assert_normalized(&text, "Waves crashashore");
}

#[tokio::test]
async fn test_modelscope_blank_stream_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(&["  ", "\n"]), "text/event-stream"))
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::ModelScope)
        .with_api_key("ms-key")
        .with_model("Qwen/Qwen3-8B")
        .with_base_url(server.uri());

    let err = Dispatcher::new().invoke(&config, PROMPT).await.unwrap_err();
    assert!(matches!(err, LlmError::ResponseShape { provider: ProviderId::ModelScope, .. }));
}

#[tokio::test]
async fn test_pollinations_sends_seed_and_options() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai"))
        .and(body_partial_json(json!({
            "model": "openai-fast",
            "seed": 101,
            "private": true,
            "referrer": "shorts-bot"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("free\ntext")))
        .expect(1)
        .mount(&server)
        .await;

    let mut config =
        ProviderConfig::new(ProviderId::Pollinations).with_base_url(format!("{}/openai", server.uri()));
    config.private = true;
    config.referrer = Some("shorts-bot".to_string());

    let text = Dispatcher::new().invoke(&config, PROMPT).await.unwrap();
    assert_normalized(&text, "freetext");
}

#[tokio::test]
async fn test_ernie_exchanges_token_on_every_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/2.0/token"))
        .and(query_param("grant_type", "client_credentials"))
        .and(query_param("client_id", "ak"))
        .and(query_param("client_secret", "sk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-123",
            "expires_in": 2592000
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions_pro"))
        .and(query_param("access_token", "tok-123"))
        .and(body_partial_json(json!({"penalty_score": 1, "response_format": "text"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "as-1",
            "result": "ernie\nsays hi"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::Ernie)
        .with_api_key("ak")
        .with_secret_key("sk")
        .with_token_url(format!("{}/oauth/2.0/token", server.uri()))
        .with_base_url(format!("{}/chat/completions_pro", server.uri()));

    let dispatcher = Dispatcher::new();
    let first = dispatcher.invoke(&config, PROMPT).await.unwrap();
    let second = dispatcher.invoke(&config, PROMPT).await.unwrap();
    assert_normalized(&first, "erniesays hi");
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_ernie_error_body_is_a_shape_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error_code": 17,
            "error_msg": "Open api daily request limit reached"
        })))
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::Ernie)
        .with_api_key("ak")
        .with_secret_key("sk")
        .with_token_url(format!("{}/token", server.uri()))
        .with_base_url(format!("{}/chat", server.uri()));

    let err = Dispatcher::new().invoke(&config, PROMPT).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "[ernie] returned an invalid response: Open api daily request limit reached"
    );
}

#[tokio::test]
async fn test_ernie_token_without_access_token_is_a_shape_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "unknown client id"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::Ernie)
        .with_api_key("ak")
        .with_secret_key("sk")
        .with_token_url(format!("{}/token", server.uri()))
        .with_base_url(format!("{}/chat", server.uri()));

    let err = Dispatcher::new().invoke(&config, PROMPT).await.unwrap_err();
    assert!(matches!(err, LlmError::ResponseShape { provider: ProviderId::Ernie, .. }));
    assert!(err.to_string().contains("unknown client id"), "{}", err);
}

/// Address with nothing listening on it.
fn closed_local_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_connection_errors_do_not_expose_credentials() {
    let base = closed_local_url();
    let dispatcher = Dispatcher::new();

    let gemini = ProviderConfig::new(ProviderId::Gemini)
        .with_api_key("AIzaSECRETKEY123456")
        .with_model("gemini-pro")
        .with_base_url(format!("{}/v1beta", base));
    let err = dispatcher.invoke(&gemini, PROMPT).await.unwrap_err();
    assert!(matches!(err, LlmError::Transport { provider: ProviderId::Gemini, .. }));
    assert!(!err.to_string().contains("AIzaSECRETKEY123456"), "{}", err);

    let ernie = ProviderConfig::new(ProviderId::Ernie)
        .with_api_key("client-id")
        .with_secret_key("ERNIESECRET")
        .with_token_url(format!("{}/oauth/2.0/token", base))
        .with_base_url(format!("{}/chat", base));
    let err = dispatcher.invoke(&ernie, PROMPT).await.unwrap_err();
    assert!(matches!(err, LlmError::Transport { provider: ProviderId::Ernie, .. }));
    assert!(!err.to_string().contains("ERNIESECRET"), "{}", err);
    assert!(!err.to_string().contains("client_secret"), "{}", err);
}

#[tokio::test]
async fn test_cloudflare_reads_result_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts/acct-1/ai/run/llama-3-8b"))
        .and(header("Authorization", "Bearer cf-token"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "system", "content": "You are a friendly assistant"},
                {"role": "user", "content": PROMPT}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"response": "cloud\nflare"},
            "success": true,
            "errors": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::Cloudflare)
        .with_api_key("cf-token")
        .with_model("llama-3-8b")
        .with_account_id("acct-1")
        .with_base_url(server.uri());

    let text = Dispatcher::new().invoke(&config, PROMPT).await.unwrap();
    assert_normalized(&text, "cloudflare");
}

#[tokio::test]
async fn test_qwen_reads_output_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/services/aigc/text-generation/generation"))
        .and(header("Authorization", "Bearer ds-key"))
        .and(body_partial_json(json!({"model": "qwen-max", "input": {"messages": [{"role": "user"}]}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": {"text": "qwen\nreply", "finish_reason": "stop"},
            "request_id": "r-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::Qwen)
        .with_api_key("ds-key")
        .with_model("qwen-max")
        .with_base_url(format!(
            "{}/api/v1/services/aigc/text-generation/generation",
            server.uri()
        ));

    let text = Dispatcher::new().invoke(&config, PROMPT).await.unwrap();
    assert_normalized(&text, "qwenreply");
}

#[tokio::test]
async fn test_qwen_error_status_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "InvalidApiKey",
            "message": "Invalid API-key provided."
        })))
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::Qwen)
        .with_api_key("bad")
        .with_model("qwen-max")
        .with_base_url(server.uri());

    let err = Dispatcher::new().invoke(&config, PROMPT).await.unwrap_err();
    assert!(matches!(err, LlmError::Transport { provider: ProviderId::Qwen, .. }));
    assert!(err.to_string().contains("InvalidApiKey"));
}

#[tokio::test]
async fn test_gemini_reads_candidate_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-pro:generateContent"))
        .and(header("x-goog-api-key", "AIza-key"))
        .and(body_partial_json(json!({"generationConfig": {"maxOutputTokens": 2048}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "gem\nini"}], "role": "model"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::Gemini)
        .with_api_key("AIza-key")
        .with_model("gemini-pro")
        .with_base_url(format!("{}/", server.uri()));

    let text = Dispatcher::new().invoke(&config, PROMPT).await.unwrap();
    assert_normalized(&text, "gemini");
}

#[tokio::test]
async fn test_gemini_without_text_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::Gemini)
        .with_api_key("AIza-key")
        .with_model("gemini-pro")
        .with_base_url(server.uri());

    let err = Dispatcher::new().invoke(&config, PROMPT).await.unwrap_err();
    assert!(matches!(err, LlmError::ResponseShape { provider: ProviderId::Gemini, .. }));
    assert!(err.to_string().contains("SAFETY"));
}

#[tokio::test]
async fn test_missing_credentials_never_reach_the_network() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let credentialed = [
        ProviderId::OpenAI,
        ProviderId::OneApi,
        ProviderId::Azure,
        ProviderId::Moonshot,
        ProviderId::DeepSeek,
        ProviderId::ModelScope,
        ProviderId::Ernie,
        ProviderId::Cloudflare,
        ProviderId::Qwen,
        ProviderId::Gemini,
    ];

    let dispatcher = Dispatcher::new();
    for provider in credentialed {
        let config = ProviderConfig::new(provider)
            .with_model("some-model")
            .with_base_url(server.uri())
            .with_secret_key("secret")
            .with_account_id("acct")
            .with_token_url(server.uri())
            .without_api_key();

        let err = dispatcher.invoke(&config, PROMPT).await.unwrap_err();
        assert!(err.is_configuration(), "{} should fail validation", provider);
        assert_eq!(err.provider(), Some(provider));
        assert!(err.to_string().contains("api_key is not set"));
    }
}

#[tokio::test]
async fn test_non_success_status_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::OpenAI)
        .with_api_key("sk")
        .with_model("gpt-4o-mini")
        .with_base_url(server.uri());

    let err = Dispatcher::new().invoke(&config, PROMPT).await.unwrap_err();
    assert!(matches!(err, LlmError::Transport { provider: ProviderId::OpenAI, .. }));
    assert!(err.to_string().contains("upstream exploded"));
}

#[tokio::test]
async fn test_malformed_json_and_wrong_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/broken/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/odd/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "hi"})))
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new();
    let config = |base: &str| {
        ProviderConfig::new(ProviderId::DeepSeek)
            .with_api_key("sk")
            .with_model("deepseek-chat")
            .with_base_url(format!("{}/{}", server.uri(), base))
    };

    let err = dispatcher.invoke(&config("broken"), PROMPT).await.unwrap_err();
    assert!(matches!(err, LlmError::Transport { .. }));

    let err = dispatcher.invoke(&config("odd"), PROMPT).await.unwrap_err();
    assert!(matches!(err, LlmError::ResponseShape { .. }));
}

#[tokio::test]
async fn test_slow_backend_hits_attempt_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("late"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::OpenAI)
        .with_api_key("sk")
        .with_model("gpt-4o-mini")
        .with_base_url(server.uri())
        .with_timeout(Duration::from_millis(200));

    let err = Dispatcher::new().invoke(&config, PROMPT).await.unwrap_err();
    assert!(matches!(err, LlmError::Transport { .. }));
    assert!(err.to_string().ends_with("timed out after 200ms"), "{}", err);
}

struct EchoAdapter {
    calls: AtomicUsize,
}

#[async_trait]
impl ProviderAdapter for EchoAdapter {
    fn provider_id(&self) -> ProviderId {
        ProviderId::OpenAI
    }

    fn validate_config(&self, _config: &ProviderConfig) -> Result<(), LlmError> {
        Ok(())
    }

    async fn send(
        &self,
        _http: &reqwest::Client,
        _config: &ProviderConfig,
        prompt: &str,
    ) -> Result<String, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("echo:\n{}", prompt))
    }
}

#[tokio::test]
async fn test_identical_calls_give_identical_output() {
    let adapter = Arc::new(EchoAdapter {
        calls: AtomicUsize::new(0),
    });
    let mut registry = ProviderRegistry::with_defaults();
    registry.replace(adapter.clone());
    let dispatcher = Dispatcher::with_registry(registry);

    let config = ProviderConfig::new(ProviderId::OpenAI);
    let first = dispatcher.invoke(&config, "same\nprompt").await;
    let second = dispatcher.invoke(&config, "same\nprompt").await;

    assert_eq!(first, Ok("echo:sameprompt".to_string()));
    assert_eq!(first, second);
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 2);
}
