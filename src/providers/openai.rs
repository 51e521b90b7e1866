use super::{LLMProvider, ProviderResponse, base_client::BaseApiClient};
use crate::catalog::{self, ModelInfo};
use crate::conversation::Message;
use crate::core::error::AskError;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Body of a `chat/completions` call.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub temperature: f64,
    pub stream: bool,
    pub messages: &'a [Message],
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Deserialize)]
struct ModelListResponse {
    data: Vec<Value>,
}

/// Extracts `choices[0].message.content` from a complete, non-streamed body.
pub fn parse_completion_text(body: &[u8]) -> Option<String> {
    let parsed: ChatCompletionResponse = serde_json::from_slice(body).ok()?;
    parsed.choices.into_iter().next()?.message.content
}

/// Extracts `error.message` from an error envelope.
pub fn parse_error_message(body: &[u8]) -> Option<String> {
    let parsed: ErrorEnvelope = serde_json::from_slice(body).ok()?;
    parsed.error.message
}

/// Builds the user-facing error for an HTTP failure status.
pub fn api_error(status: u16, body: &[u8]) -> AskError {
    let message = parse_error_message(body).unwrap_or_else(|| {
        reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("unexpected response")
            .to_string()
    });
    AskError::Api { status, message }
}

/// Parses a `models` listing, stamping entries without `created` with `now`.
pub fn parse_model_list(body: &[u8], now: i64) -> Result<Vec<ModelInfo>, AskError> {
    let parsed: ModelListResponse = serde_json::from_slice(body)?;
    Ok(parsed
        .data
        .iter()
        .filter_map(|entry| catalog::model_from_value(entry, Some(now)))
        .collect())
}

#[derive(Clone)]
pub struct OpenAIProvider {
    client: BaseApiClient,
}

impl OpenAIProvider {
    pub fn with_endpoint(endpoint: &str, api_key: &str) -> Result<Self, AskError> {
        Ok(Self {
            client: BaseApiClient::new(endpoint, api_key)?,
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat_completion(
        &self,
        request: &ChatCompletionRequest<'_>,
    ) -> Result<ProviderResponse, AskError> {
        let response = self
            .client
            .post("chat/completions", request, request.stream)
            .await?;

        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(AskError::from))
            .boxed();

        Ok(ProviderResponse { status, body })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, AskError> {
        let response = self.client.get("models").await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        if status != 200 {
            return Err(api_error(status, &body));
        }

        parse_model_list(&body, chrono::Utc::now().timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;

    #[test]
    fn request_serializes_in_documented_shape() {
        let messages = vec![
            Message::new(Role::System, "be brief"),
            Message::new(Role::User, "hi"),
        ];
        let request = ChatCompletionRequest {
            model: "gpt-4o",
            temperature: 0.5,
            stream: true,
            messages: &messages,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"model":"gpt-4o","temperature":0.5,"stream":true,"messages":[{"role":"system","content":"be brief"},{"role":"user","content":"hi"}]}"#
        );
    }

    #[test]
    fn completion_text_comes_from_first_choice() {
        let body = br#"{"choices":[{"message":{"role":"assistant","content":"Paris"}},{"message":{"content":"Lyon"}}]}"#;
        assert_eq!(parse_completion_text(body).as_deref(), Some("Paris"));
        assert_eq!(parse_completion_text(br#"{"choices":[]}"#), None);
        assert_eq!(parse_completion_text(b"not json"), None);
    }

    #[test]
    fn api_error_prefers_envelope_message() {
        let err = api_error(
            404,
            br#"{"error":{"message":"The model does not exist","type":"invalid_request_error"}}"#,
        );
        match err {
            AskError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "The model does not exist");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn api_error_falls_back_to_status_reason() {
        match api_error(503, b"<html>busy</html>") {
            AskError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Service Unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn model_list_skips_entries_without_id() {
        let body = br#"{"object":"list","data":[
            {"id":"gpt-4o","created":1715367049},
            {"created":1},
            {"id":"whisper-1"}
        ]}"#;
        let models = parse_model_list(body, 42).unwrap();
        assert_eq!(
            models,
            vec![
                ModelInfo::new("gpt-4o", 1715367049),
                ModelInfo::new("whisper-1", 42),
            ]
        );
    }

    #[test]
    fn model_list_requires_data_array() {
        assert!(parse_model_list(br#"{"models":[]}"#, 0).is_err());
    }
}
