use crate::conversation::ConversationBuffer;
use crate::core::error::AskError;
use crate::display;
use crate::progress::{ProgressIndicator, Signal};
use crate::providers::openai::{api_error, parse_completion_text, parse_error_message};
use crate::providers::{ChatCompletionRequest, LLMProvider};
use crate::stream::StreamDecoder;
use futures::StreamExt;
use std::io::Write;
use tracing::{debug, info, warn};

/// Which failures get another attempt, and how many attempts there are.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    retryable: fn(&AskError) -> bool,
}

impl Default for RetryPolicy {
    /// Two attempts, retrying timeouts only.
    fn default() -> Self {
        Self::new(2, AskError::is_timeout)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, retryable: fn(&AskError) -> bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retryable,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `attempt` is 1-based and refers to the attempt that just failed.
    pub fn should_retry(&self, attempt: u32, error: &AskError) -> bool {
        attempt < self.max_attempts && (self.retryable)(error)
    }
}

/// Serializes the conversation into a completion request.
pub fn build_request<'a>(
    buffer: &'a ConversationBuffer,
    model: &'a str,
    temperature: f64,
    streaming: bool,
) -> ChatCompletionRequest<'a> {
    ChatCompletionRequest {
        model,
        temperature,
        stream: streaming,
        messages: buffer.messages(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Whether the text arrived as incremental fragments.
    pub streamed: bool,
}

struct Exchange {
    status: u16,
    body: Vec<u8>,
    decoder: StreamDecoder,
}

pub struct RequestDispatcher {
    provider: Box<dyn LLMProvider>,
    policy: RetryPolicy,
    show_progress: bool,
}

impl RequestDispatcher {
    pub fn new(provider: Box<dyn LLMProvider>) -> Self {
        Self {
            provider,
            policy: RetryPolicy::default(),
            show_progress: true,
        }
    }

    #[cfg(test)]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn provider(&self) -> &dyn LLMProvider {
        self.provider.as_ref()
    }

    /// Sends `request`, writing the reply to `out` as it arrives.
    ///
    /// Timeouts are retried according to the policy. HTTP error statuses
    /// come back as [`AskError::Api`] and are never retried.
    pub async fn send<W: Write>(
        &self,
        request: &ChatCompletionRequest<'_>,
        out: &mut W,
    ) -> Result<Reply, AskError> {
        info!(
            "Sending request (model: {}, temp: {:.2}, stream: {})",
            request.model,
            request.temperature,
            if request.stream { "enabled" } else { "disabled" }
        );

        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1;
        loop {
            info!("Attempt {}/{}", attempt, max_attempts);
            match self.attempt(request, out).await {
                Ok(reply) => return Ok(reply),
                Err(err) if self.policy.should_retry(attempt, &err) => {
                    warn!("Attempt {} failed: {}", attempt, err);
                    display::display_retry(attempt, max_attempts);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt<W: Write>(
        &self,
        request: &ChatCompletionRequest<'_>,
        out: &mut W,
    ) -> Result<Reply, AskError> {
        let first_content = Signal::new();
        let mut indicator = self
            .show_progress
            .then(|| ProgressIndicator::start(first_content.clone()));

        let result = self
            .exchange(request, out, first_content, &mut indicator)
            .await;

        if let Some(indicator) = indicator {
            indicator.finish().await;
        }

        let exchange = result?;
        debug!("Response size: {} bytes", exchange.body.len());
        complete(exchange, request.stream, out)
    }

    async fn exchange<W: Write>(
        &self,
        request: &ChatCompletionRequest<'_>,
        out: &mut W,
        first_content: Signal,
        indicator: &mut Option<ProgressIndicator>,
    ) -> Result<Exchange, AskError> {
        let mut response = self.provider.chat_completion(request).await?;
        let decode = request.stream && response.is_success();

        let mut decoder = StreamDecoder::with_signal(first_content);
        let mut body = Vec::new();
        while let Some(chunk) = response.body.next().await {
            let chunk = chunk?;
            debug!("Received {} bytes from API", chunk.len());
            body.extend_from_slice(&chunk);

            if decode {
                let fragments = decoder.decode(&chunk);
                if !fragments.is_empty() {
                    if let Some(indicator) = indicator.take() {
                        indicator.finish().await;
                    }
                    decoder.emit(&fragments, out)?;
                }
            }
        }

        Ok(Exchange {
            status: response.status,
            body,
            decoder,
        })
    }
}

/// Turns a finished exchange into printed output and a [`Reply`].
fn complete<W: Write>(exchange: Exchange, streaming: bool, out: &mut W) -> Result<Reply, AskError> {
    let Exchange {
        status,
        body,
        decoder,
    } = exchange;

    if status >= 400 {
        return Err(api_error(status, &body));
    }

    if streaming && status < 300 && !decoder.is_done() {
        debug!("Stream ended without a [DONE] marker");
    }

    if streaming && decoder.saw_content() {
        writeln!(out)?;
        out.flush()?;
        return Ok(Reply {
            text: decoder.into_text(),
            streamed: true,
        });
    }

    if streaming && body.is_empty() {
        writeln!(out)?;
        out.flush()?;
        return Ok(Reply {
            text: String::new(),
            streamed: true,
        });
    }

    if streaming {
        debug!("Stream produced no incremental content, parsing body as a single completion");
    }

    match parse_completion_text(&body) {
        Some(text) => {
            writeln!(out, "{}", text)?;
            out.flush()?;
            Ok(Reply {
                text,
                streamed: false,
            })
        }
        None => Err(AskError::Api {
            status,
            message: parse_error_message(&body)
                .unwrap_or_else(|| "response contained no completion text".to_string()),
        }),
    }
}
