//! LLM completion client — OpenAI-compatible chat-completions API
//!
//! Provides a `CompletionBackend` trait and `ChatCompletionClient`, which talks
//! to any endpoint that speaks the `/chat/completions` wire format (xAI by
//! default). One request per call; there is no retry.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::LlmConfig;

// ============================================================================
// CompletionBackend trait
// ============================================================================

/// Abstraction over chat-completion providers.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send a system + user prompt and return the assistant message content.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing API key")]
    MissingApiKey,

    #[error("Response contained no choices")]
    EmptyResponse,

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl LlmSettings {
    /// Build settings from config, reading the key from `config.api_key_env`
    /// when none is given.
    pub fn from_config(config: &LlmConfig, api_key: Option<String>) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var(&config.api_key_env).ok())
            .unwrap_or_default();

        Self {
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

// ============================================================================
// Wire structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiErrorDetail {
    Object { message: String },
    Text(String),
}

// ============================================================================
// ChatCompletionClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    client: Client,
    settings: LlmSettings,
    base_url: String,
}

impl ChatCompletionClient {
    pub fn new(settings: LlmSettings, base_url: String) -> Result<Self, LlmError> {
        if settings.api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let client = Client::builder().timeout(settings.timeout).build()?;

        Ok(Self {
            client,
            settings,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &LlmConfig, api_key: Option<String>) -> Result<Self, LlmError> {
        Self::new(
            LlmSettings::from_config(config, api_key),
            config.base_url.clone(),
        )
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        tracing::debug!(model = %self.settings.model, prompt_chars = user_prompt.len(), "Sending chat completion");

        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.settings.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|detail| match detail {
                    ApiErrorDetail::Object { message } => message,
                    ApiErrorDetail::Text(message) => message,
                })
                .unwrap_or(error_body);

            tracing::error!(code = status.as_u16(), message = %message, "Chat completion API error");

            return Err(LlmError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let chat_response: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::MalformedResponse(format!("unexpected envelope: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse)
    }

    fn name(&self) -> &str {
        "chat-completions"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_settings(api_key: &str) -> LlmSettings {
        LlmSettings {
            api_key: api_key.to_string(),
            model: "grok-4-latest".to_string(),
            temperature: 0.0,
            timeout: Duration::from_secs(5),
        }
    }

    fn mock_completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "cmpl-1",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": content } }
            ]
        })
    }

    #[tokio::test]
    async fn test_complete_sends_openai_shaped_request() {
        let mock_server = MockServer::start().await;
        let client = ChatCompletionClient::new(test_settings("test-api-key"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-api-key"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "model": "grok-4-latest",
                "messages": [
                    { "role": "system", "content": "be brief" },
                    { "role": "user", "content": "hello" }
                ],
                "temperature": 0.0,
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_completion("{\"ok\":true}")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = client.complete("be brief", "hello").await;

        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result.err());
        assert_eq!(result.unwrap(), "{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_api_500_is_reported_without_retry() {
        let mock_server = MockServer::start().await;
        let client = ChatCompletionClient::new(test_settings("test-api-key"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "message": "Internal server error", "type": "server_error" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        match client.complete("s", "u").await {
            Err(LlmError::Api { code, message }) => {
                assert_eq!(code, 500);
                assert_eq!(message, "Internal server error");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_plain_string_error_body() {
        let mock_server = MockServer::start().await;
        let client = ChatCompletionClient::new(test_settings("bad"), mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": "invalid-key",
                "error": "Incorrect API key provided"
            })))
            .mount(&mock_server)
            .await;

        match client.complete("s", "u").await {
            Err(LlmError::Api { code, message }) => {
                assert_eq!(code, 400);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_choices_is_error() {
        let mock_server = MockServer::start().await;
        let client = ChatCompletionClient::new(test_settings("k"), mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
            .mount(&mock_server)
            .await;

        assert!(matches!(
            client.complete("s", "u").await,
            Err(LlmError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_non_json_envelope_is_malformed() {
        let mock_server = MockServer::start().await;
        let client = ChatCompletionClient::new(test_settings("k"), mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&mock_server)
            .await;

        assert!(matches!(
            client.complete("s", "u").await,
            Err(LlmError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_missing_api_key() {
        let result = ChatCompletionClient::new(test_settings(""), "http://localhost".to_string());
        assert!(matches!(result, Err(LlmError::MissingApiKey)));
    }

    #[test]
    fn test_settings_read_key_from_configured_env_var() {
        let config = LlmConfig {
            api_key_env: "CHATCTX_TEST_KEY_FROM_ENV".to_string(),
            ..Default::default()
        };
        std::env::set_var("CHATCTX_TEST_KEY_FROM_ENV", "secret");
        let settings = LlmSettings::from_config(&config, None);
        std::env::remove_var("CHATCTX_TEST_KEY_FROM_ENV");

        assert_eq!(settings.api_key, "secret");
        assert_eq!(settings.model, "grok-4-latest");
        assert_eq!(settings.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_explicit_key_wins_over_env() {
        let settings = LlmSettings::from_config(&LlmConfig::default(), Some("explicit".to_string()));
        assert_eq!(settings.api_key, "explicit");
    }
}
