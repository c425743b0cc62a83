//! OpenAI-compatible chat-completion client.
//!
//! Posts `{model, messages, max_tokens, temperature}` to
//! `<base_url>/chat/completions` and returns the first choice's text. Any
//! endpoint speaking the same protocol (Azure, local gateways) works by
//! changing `base_url`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use srsw_core::config::ModelConfig;
use srsw_core::error::{Result, SrsError};
use srsw_core::model::{ChatMessage, ChatModel, ChatOptions, ModelError};

/// Chat model backed by an OpenAI-compatible REST API.
#[derive(Clone)]
pub struct OpenAiChatModel {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    defaults: ChatOptions,
}

impl OpenAiChatModel {
    /// Creates a client with an explicit API key.
    pub fn new(base_url: &str, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
            defaults: ChatOptions::default(),
        }
    }

    /// Builds a client from configuration, reading the key from `api_key_env`.
    ///
    /// # Errors
    ///
    /// Returns `SrsError::Config` if the environment variable is unset or empty.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                SrsError::config(format!(
                    "{} is not set; export it or change model.api_key_env",
                    config.api_key_env
                ))
            })?;

        let mut model = Self::new(&config.base_url, api_key, &config.model);
        model.defaults = ChatOptions {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };
        Ok(model)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        options: &ChatOptions,
    ) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: options.max_tokens.or(self.defaults.max_tokens),
            temperature: options.temperature.or(self.defaults.temperature),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn send(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> std::result::Result<String, ModelError> {
        let body = self.build_request(messages, options);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(map_http_error(status, &body_text));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelError::new(format!("Failed to parse chat completion: {e}")))?;

        extract_text_response(parsed)
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn extract_text_response(
    response: ChatCompletionResponse,
) -> std::result::Result<String, ModelError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ModelError::new("Chat completion returned no content"))
}

fn map_transport_error(err: reqwest::Error) -> ModelError {
    let message = format!("Chat completion request failed: {err}");
    if err.is_timeout() {
        ModelError::new(message).with_code("ETIMEDOUT")
    } else if err.is_connect() {
        ModelError::new(message).with_code("ERR_NETWORK_CHANGED")
    } else if err.is_request() || err.is_body() {
        ModelError::new(message).with_code("ECONNRESET")
    } else {
        ModelError::new(message)
    }
}

fn map_http_error(status: StatusCode, body: &str) -> ModelError {
    let detail = serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    let reason = status.canonical_reason().unwrap_or("HTTP error");

    ModelError::new(format!("HTTP {} {}: {}", status.as_u16(), reason, detail))
        .with_status(status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;
    use srsw_core::model::{ErrorCategory, ErrorClassifier, NetworkErrorClassifier};

    #[test]
    fn test_request_body_shape() {
        let model = OpenAiChatModel::new("https://example.test/v1/", "key", "gpt-test");
        assert_eq!(model.endpoint(), "https://example.test/v1/chat/completions");

        let messages = vec![ChatMessage::system("rules"), ChatMessage::user("write FR")];
        let body = model.build_request(
            &messages,
            &ChatOptions {
                max_tokens: Some(256),
                temperature: None,
            },
        );
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "gpt-test");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "write FR");
        assert_eq!(json["max_tokens"], 256);
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_http_errors_classify_by_status() {
        let unauthorized = map_http_error(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Incorrect API key provided"}}"#,
        );
        assert_eq!(unauthorized.status, Some(401));
        assert!(unauthorized.message.contains("Incorrect API key provided"));
        assert_eq!(
            NetworkErrorClassifier.classify(&unauthorized).category,
            ErrorCategory::Auth
        );

        let overloaded = map_http_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(
            NetworkErrorClassifier.classify(&overloaded).category,
            ErrorCategory::Server
        );
    }

    #[test]
    fn test_extract_text_response() {
        let parsed: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"hello"}}]}"#).unwrap();
        assert_eq!(extract_text_response(parsed).unwrap(), "hello");

        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(extract_text_response(empty).is_err());
    }
}
