use crate::core::error::AskError;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Thin wrapper over a reqwest client that knows the endpoint and credential.
#[derive(Clone)]
pub struct BaseApiClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl BaseApiClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, AskError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AskError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Builds an authenticated JSON POST. `Accept: text/event-stream` is
    /// only sent when the reply is expected as an event stream.
    pub fn chat_request<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        event_stream: bool,
    ) -> RequestBuilder {
        let request = self
            .client
            .post(self.url(path))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json");

        let request = if event_stream {
            request.header(ACCEPT, "text/event-stream")
        } else {
            request
        };
        request.json(payload)
    }

    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        event_stream: bool,
    ) -> Result<Response, AskError> {
        debug!("POST {} (event stream: {})", self.url(path), event_stream);
        let response = self.chat_request(path, payload, event_stream).send().await?;
        Ok(response)
    }

    pub fn get_request(&self, path: &str) -> RequestBuilder {
        self.client
            .get(self.url(path))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
    }

    pub async fn get(&self, path: &str) -> Result<Response, AskError> {
        debug!("GET {}", self.url(path));
        let response = self.get_request(path).send().await?;
        Ok(response)
    }
}
