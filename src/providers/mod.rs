use crate::catalog::ModelInfo;
use crate::core::error::AskError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

pub mod base_client;
pub mod openai;
#[cfg(test)]
pub mod testing;

pub use openai::{ChatCompletionRequest, OpenAIProvider};

pub type ByteStream = BoxStream<'static, Result<Bytes, AskError>>;

/// Status line and body of a completion call, body not yet read.
pub struct ProviderResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl ProviderResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Sends a chat completion request and hands back the raw body stream.
    async fn chat_completion(
        &self,
        request: &ChatCompletionRequest<'_>,
    ) -> Result<ProviderResponse, AskError>;

    /// Lists the model identifiers the endpoint accepts.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, AskError>;
}
