//! Text generation client.
//!
//! The pipeline only needs "prompt in, text out", expressed as the
//! [`Generator`] trait. [`HttpGenerator`] implements it over HTTP for an
//! Ollama server (`/api/chat`) or an OpenAI-compatible endpoint
//! (`/v1/chat/completions`), retrying failed calls with exponential backoff.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

use draftsmith_shared::{DraftsmithError, GenerationConfig, LlmConfig, LlmProvider, Result};

use crate::prompt::Prompt;

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("Draftsmith/", env!("CARGO_PKG_VERSION"));

/// First retry delay; doubled on every further attempt.
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Longest wait between two attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Token budget for the connection check.
const CHECK_MAX_TOKENS: u32 = 10;

/// Sampling parameters for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl From<&GenerationConfig> for GenerationOptions {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: config.top_p,
        }
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

/// Anything that can turn a prompt into text.
pub trait Generator: Send + Sync {
    fn generate(
        &self,
        prompt: &Prompt,
        options: &GenerationOptions,
    ) -> impl Future<Output = Result<String>> + Send;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: ResponseMessage,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// HttpGenerator
// ---------------------------------------------------------------------------

/// Chat-completion client for Ollama or OpenAI-compatible servers.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: Client,
    provider: LlmProvider,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    max_retries: u32,
    backoff: Duration,
}

impl HttpGenerator {
    /// Build a client for the configured endpoint.
    ///
    /// `api_key` is sent as a bearer token when present; resolve it with
    /// `resolve_api_key`.
    pub fn new(config: &LlmConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DraftsmithError::Generation(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            provider: config.provider,
            endpoint: endpoint_url(&config.base_url, config.provider)?,
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries.max(1),
            backoff: DEFAULT_BACKOFF,
        })
    }

    /// Override the first retry delay.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send one short prompt without retrying and return the reply.
    #[instrument(skip_all, fields(provider = %self.provider, endpoint = %self.endpoint))]
    pub async fn test_connection(&self) -> Result<String> {
        let prompt = Prompt {
            system: "You are a connectivity check.".into(),
            user: "Hello, please respond with 'OK'.".into(),
        };
        let options = GenerationOptions {
            max_tokens: CHECK_MAX_TOKENS,
            ..GenerationOptions::default()
        };
        match self.request_once(&prompt, &options).await {
            Ok(reply) => {
                info!(reply = %reply.chars().take(50).collect::<String>(), "connection ok");
                Ok(reply)
            }
            Err(e) => {
                warn!(error = %e, "connection check failed");
                Err(e)
            }
        }
    }

    async fn request_once(&self, prompt: &Prompt, options: &GenerationOptions) -> Result<String> {
        let messages = vec![
            ChatMessage {
                role: "system",
                content: &prompt.system,
            },
            ChatMessage {
                role: "user",
                content: &prompt.user,
            },
        ];

        let request = match self.provider {
            LlmProvider::Ollama => self.client.post(self.endpoint.clone()).json(&OllamaRequest {
                model: &self.model,
                messages,
                stream: false,
                options: OllamaOptions {
                    temperature: options.temperature,
                    num_predict: options.max_tokens,
                    top_p: options.top_p,
                },
            }),
            LlmProvider::OpenAi => self.client.post(self.endpoint.clone()).json(&OpenAiRequest {
                model: &self.model,
                messages,
                temperature: options.temperature,
                max_tokens: options.max_tokens,
                top_p: options.top_p,
            }),
        };
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| DraftsmithError::Generation(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DraftsmithError::Generation(format!(
                "{}: HTTP {status}: {}",
                self.endpoint,
                body.chars().take(200).collect::<String>()
            )));
        }

        let content = match self.provider {
            LlmProvider::Ollama => {
                let body: OllamaResponse = response.json().await.map_err(|e| {
                    DraftsmithError::Generation(format!("invalid Ollama response: {e}"))
                })?;
                if let Some(prompt_tokens) = body.prompt_eval_count {
                    info!(
                        prompt_tokens,
                        completion_tokens = body.eval_count.unwrap_or(0),
                        "token usage"
                    );
                }
                body.message.content
            }
            LlmProvider::OpenAi => {
                let body: OpenAiResponse = response.json().await.map_err(|e| {
                    DraftsmithError::Generation(format!("invalid completion response: {e}"))
                })?;
                if let Some(usage) = &body.usage {
                    info!(
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        "token usage"
                    );
                }
                body.choices.into_iter().next().and_then(|c| c.message.content)
            }
        };

        match content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(DraftsmithError::Generation("model returned no content".into())),
        }
    }
}

impl Generator for HttpGenerator {
    async fn generate(&self, prompt: &Prompt, options: &GenerationOptions) -> Result<String> {
        self.generate_with_retries(prompt, options).await
    }
}

impl HttpGenerator {
    #[instrument(skip_all, fields(provider = %self.provider, model = %self.model))]
    async fn generate_with_retries(
        &self,
        prompt: &Prompt,
        options: &GenerationOptions,
    ) -> Result<String> {
        debug!(
            chars = prompt.system.len() + prompt.user.len(),
            temperature = options.temperature,
            max_tokens = options.max_tokens,
            "sending generation request"
        );

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.request_once(prompt, options).await {
                Ok(text) => {
                    info!(chars = text.len(), attempt, "generated text");
                    return Ok(text);
                }
                Err(e) if attempt < self.max_retries => {
                    let delay = retry_delay(self.backoff, attempt);
                    warn!(
                        error = %e,
                        attempt,
                        max = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "generation attempt failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(error = %e, attempts = attempt, "generation failed");
                    return Err(e);
                }
            }
        }
    }
}

/// Wait after failed attempt number `attempt` (1-based): `base`, doubled per
/// attempt, capped at [`MAX_BACKOFF`].
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Chat endpoint under `base_url` for the provider.
fn endpoint_url(base_url: &str, provider: LlmProvider) -> Result<Url> {
    let base = format!("{}/", base_url.trim_end_matches('/'));
    let base = Url::parse(&base)
        .map_err(|e| DraftsmithError::config(format!("invalid llm.base_url '{base_url}': {e}")))?;
    let path = match provider {
        LlmProvider::Ollama => "api/chat",
        LlmProvider::OpenAi => "v1/chat/completions",
    };
    base.join(path)
        .map_err(|e| DraftsmithError::config(format!("invalid llm.base_url '{base_url}': {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prompt() -> Prompt {
        Prompt {
            system: "be brief".into(),
            user: "write the intro".into(),
        }
    }

    fn config(server: &MockServer, provider: LlmProvider) -> LlmConfig {
        LlmConfig {
            provider,
            base_url: server.uri(),
            model: "test-model".into(),
            max_retries: 3,
            ..Default::default()
        }
    }

    #[test]
    fn endpoint_joins_provider_path() {
        let url = endpoint_url("http://localhost:11434/", LlmProvider::Ollama).unwrap();
        assert_eq!(url.as_str(), "http://localhost:11434/api/chat");

        let url = endpoint_url("https://gw.example.com/proxy", LlmProvider::OpenAi).unwrap();
        assert_eq!(url.as_str(), "https://gw.example.com/proxy/v1/chat/completions");

        assert!(endpoint_url("not a url", LlmProvider::Ollama).is_err());
    }

    #[test]
    fn retry_delay_doubles_then_caps() {
        let base = Duration::from_secs(1);
        assert_eq!(retry_delay(base, 1), Duration::from_secs(1));
        assert_eq!(retry_delay(base, 3), Duration::from_secs(4));
        assert_eq!(retry_delay(base, 7), MAX_BACKOFF);
        assert_eq!(retry_delay(base, 40), MAX_BACKOFF);
        assert_eq!(retry_delay(base, u32::MAX), MAX_BACKOFF);
        assert_eq!(retry_delay(Duration::ZERO, 40), Duration::ZERO);
    }

    #[tokio::test]
    async fn ollama_chat_round_trip() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "stream": false,
                "options": { "num_predict": 2000 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": { "role": "assistant", "content": "Hello there." },
                "prompt_eval_count": 12,
                "eval_count": 3
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generator = HttpGenerator::new(&config(&server, LlmProvider::Ollama), None).unwrap();
        let text = generator
            .generate(&prompt(), &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(text, "Hello there.");
    }

    #[tokio::test]
    async fn openai_sends_bearer_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "Generated." } }],
                "usage": { "prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generator = HttpGenerator::new(
            &config(&server, LlmProvider::OpenAi),
            Some("sk-test".into()),
        )
        .unwrap();
        let text = generator
            .generate(&prompt(), &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(text, "Generated.");
    }

    #[tokio::test]
    async fn retries_after_server_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": { "content": "Second time lucky." }
            })))
            .mount(&server)
            .await;

        let generator = HttpGenerator::new(&config(&server, LlmProvider::Ollama), None)
            .unwrap()
            .with_backoff(Duration::from_millis(5));
        let text = generator
            .generate(&prompt(), &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(text, "Second time lucky.");
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(3)
            .mount(&server)
            .await;

        let generator = HttpGenerator::new(&config(&server, LlmProvider::Ollama), None)
            .unwrap()
            .with_backoff(Duration::from_millis(5));
        let err = generator
            .generate(&prompt(), &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DraftsmithError::Generation(ref msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn many_retries_fail_cleanly() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500))
            .expect(40)
            .mount(&server)
            .await;

        let mut llm = config(&server, LlmProvider::Ollama);
        llm.max_retries = 40;
        let generator = HttpGenerator::new(&llm, None)
            .unwrap()
            .with_backoff(Duration::ZERO);
        let err = generator
            .generate(&prompt(), &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DraftsmithError::Generation(_)));
    }

    #[tokio::test]
    async fn connection_check_sends_one_short_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "options": { "num_predict": 10 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": { "content": "OK" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generator = HttpGenerator::new(&config(&server, LlmProvider::Ollama), None).unwrap();
        assert_eq!(generator.test_connection().await.unwrap(), "OK");
    }

    #[tokio::test]
    async fn connection_check_does_not_retry() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let generator = HttpGenerator::new(
            &config(&server, LlmProvider::OpenAi),
            Some("sk-wrong".into()),
        )
        .unwrap()
        .with_backoff(Duration::from_millis(5));
        let err = generator.test_connection().await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn blank_content_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": { "content": "   " }
            })))
            .mount(&server)
            .await;

        let mut llm = config(&server, LlmProvider::Ollama);
        llm.max_retries = 1;
        let generator = HttpGenerator::new(&llm, None).unwrap();
        assert!(generator
            .generate(&prompt(), &GenerationOptions::default())
            .await
            .is_err());
    }
}
