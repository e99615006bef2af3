use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use docket_core::errors::GenerationError;
use docket_core::provider::{GenerationRequest, GenerationResponse, TextGenerator, TokenUsage};
use docket_core::security::ApiKey;

pub const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Non-streaming client for the Anthropic Messages API.
pub struct AnthropicGenerator {
    client: Client,
    api_key: Option<ApiKey>,
    api_url: String,
}

impl AnthropicGenerator {
    pub fn new(api_key: Option<ApiKey>, api_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            api_key,
            api_url: api_url.into(),
        }
    }

    fn build_request(
        &self,
        request: &GenerationRequest,
    ) -> Result<reqwest::RequestBuilder, GenerationError> {
        let key = self.api_key.as_ref().ok_or_else(|| {
            GenerationError::BackendUnavailable("no API key configured".into())
        })?;

        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: [UserMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        Ok(self
            .client
            .post(&self.api_url)
            .header("x-api-key", key.expose())
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body))
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: [UserMessage<'a>; 1],
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// First text block of a Messages API response.
fn parse_response(body: &str) -> Result<GenerationResponse, GenerationError> {
    let parsed: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::Parse(format!("malformed backend response: {e}")))?;
    let text = parsed
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
        .ok_or_else(|| GenerationError::Parse("backend response has no text content".into()))?;
    Ok(GenerationResponse {
        text,
        usage: parsed.usage,
    })
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let req = self.build_request(request)?;

        let resp = req
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(GenerationError::from_status(status.as_u16(), body));
        }

        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn request() -> GenerationRequest {
        GenerationRequest {
            model: "claude-3-haiku-20240307".into(),
            prompt: "score this".into(),
            temperature: 0.3,
            max_tokens: 2048,
        }
    }

    #[test]
    fn configured_only_with_key() {
        let generator = AnthropicGenerator::new(None, API_URL);
        assert_eq!(generator.name(), "anthropic");
        assert!(!generator.is_configured());

        let key = ApiKey(SecretString::from("test-key"));
        assert!(AnthropicGenerator::new(Some(key), API_URL).is_configured());
    }

    #[tokio::test]
    async fn missing_key_is_backend_unavailable() {
        let generator = AnthropicGenerator::new(None, API_URL);
        let err = generator.generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::BackendUnavailable(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn request_body_shape() {
        let req = request();
        let body = MessagesRequest {
            model: &req.model,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
            messages: [UserMessage {
                role: "user",
                content: &req.prompt,
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "claude-3-haiku-20240307");
        assert_eq!(json["max_tokens"], 2048);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "score this");
    }

    #[test]
    fn parses_text_and_usage() {
        let body = r#"{
            "id": "msg_1",
            "content": [{"type": "text", "text": "{\"ok\": true}"}],
            "usage": {"input_tokens": 120, "output_tokens": 45}
        }"#;
        let resp = parse_response(body).unwrap();
        assert_eq!(resp.text, "{\"ok\": true}");
        assert_eq!(resp.usage.unwrap().total(), 165);
    }

    #[test]
    fn response_without_text_is_parse_error() {
        let err = parse_response(r#"{"content": [{"type": "tool_use", "id": "t"}]}"#).unwrap_err();
        assert!(matches!(err, GenerationError::Parse(_)));
        assert!(parse_response("<html>").is_err());
    }
}
