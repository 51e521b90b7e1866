//! Scripted provider used by unit tests in place of a live endpoint.

use super::{ChatCompletionRequest, LLMProvider, ProviderResponse};
use crate::catalog::ModelInfo;
use crate::core::error::AskError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Timeout,
    Refused,
}

impl Failure {
    fn into_error(self) -> AskError {
        match self {
            Failure::Timeout => AskError::Timeout("operation timed out".into()),
            Failure::Refused => AskError::Network("Connection failed: connection refused".into()),
        }
    }
}

pub enum Reply {
    /// The call itself fails before any status arrives.
    Fail(Failure),
    /// A status line followed by body chunks, any of which may be a failure.
    Body {
        status: u16,
        chunks: Vec<Result<Vec<u8>, Failure>>,
    },
}

impl Reply {
    pub fn ok(chunks: &[&[u8]]) -> Self {
        Self::status(200, chunks)
    }

    pub fn status(status: u16, chunks: &[&[u8]]) -> Self {
        Reply::Body {
            status,
            chunks: chunks.iter().map(|c| Ok(c.to_vec())).collect(),
        }
    }
}

#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    models: Option<Vec<ModelInfo>>,
    requests: Mutex<Vec<serde_json::Value>>,
    model_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_models(mut self, models: Vec<ModelInfo>) -> Self {
        self.models = Some(models);
        self
    }

    pub fn then(self, reply: Reply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Every completion request received, as JSON.
    pub fn requests(&self) -> Vec<serde_json::Value> {
        self.requests.lock().unwrap().clone()
    }

    pub fn model_calls(&self) -> usize {
        self.model_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat_completion(
        &self,
        request: &ChatCompletionRequest<'_>,
    ) -> Result<ProviderResponse, AskError> {
        self.requests
            .lock()
            .unwrap()
            .push(serde_json::to_value(request).unwrap());

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted reply left");

        match reply {
            Reply::Fail(failure) => Err(failure.into_error()),
            Reply::Body { status, chunks } => {
                let body = stream::iter(
                    chunks
                        .into_iter()
                        .map(|chunk| chunk.map(Bytes::from).map_err(Failure::into_error)),
                )
                .boxed();
                Ok(ProviderResponse { status, body })
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, AskError> {
        self.model_calls.fetch_add(1, Ordering::SeqCst);
        self.models
            .clone()
            .ok_or_else(|| Failure::Refused.into_error())
    }
}

/// Lets a test keep a handle on the provider after handing it over.
#[async_trait]
impl LLMProvider for Arc<ScriptedProvider> {
    async fn chat_completion(
        &self,
        request: &ChatCompletionRequest<'_>,
    ) -> Result<ProviderResponse, AskError> {
        self.as_ref().chat_completion(request).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, AskError> {
        self.as_ref().list_models().await
    }
}
