//! LLM Client Adapter (C5). See `spec.md` §4.5.
//!
//! `stream` returns a lazy, single-consumer, non-restartable sequence of
//! text fragments. Connecting is retried with backoff on transient errors;
//! the whole connect phase is bounded by `timeout`, which fires
//! `CoreError::Timeout` if no first byte arrives in time. Once streaming
//! has started, a dropped connection surfaces as a terminal
//! `CoreError::LLMUnavailable` item rather than a silent reconnect.

pub mod retry;

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, CoreResult};
use retry::{retry_with_backoff, AttemptError};

/// A single-consumer handle to an in-flight LLM response stream, adapted
/// from the teacher's channel-backed `StreamReceiver`
/// (`src/llms/streaming.rs`). Each item is either a text delta or a
/// terminal error; the channel closes after the first error or once the
/// upstream signals completion.
pub struct LlmStream {
    rx: mpsc::Receiver<CoreResult<String>>,
}

impl LlmStream {
    fn new(rx: mpsc::Receiver<CoreResult<String>>) -> Self {
        Self { rx }
    }

    /// Wrap a channel receiver directly. Used by test and alternative
    /// `LlmClient` implementations that don't go through `HttpLlmClient`.
    pub fn from_receiver(rx: mpsc::Receiver<CoreResult<String>>) -> Self {
        Self { rx }
    }

    /// Get the next text fragment, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<CoreResult<String>> {
        self.rx.recv().await
    }

    /// Drain the stream into a single string, stopping at the first error.
    pub async fn collect_text(&mut self) -> CoreResult<String> {
        let mut out = String::new();
        while let Some(item) = self.next().await {
            out.push_str(&item?);
        }
        Ok(out)
    }
}

/// The LLM Client Adapter contract.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn stream(
        &self,
        prompt: String,
        timeout: Duration,
        max_retries: u32,
        cancel: CancellationToken,
    ) -> CoreResult<LlmStream>;
}

/// `reqwest`-backed adapter against an OpenAI-compatible chat-completions
/// streaming endpoint. Modeled on the connection handling in
/// `src/llms/providers/xai/mod.rs`, swapped to this crate's stream-of-text
/// contract instead of a single accumulated response.
pub struct HttpLlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f64,
}

impl HttpLlmClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, temperature: f64) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            temperature,
        }
    }

    async fn attempt_connect(&self, prompt: &str) -> Result<reqwest::Response, AttemptError> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "stream": true,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AttemptError::retryable(format!("request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(AttemptError::retryable(format!("transient status {status}")));
        }
        Err(AttemptError::terminal(format!("non-retryable status {status}")))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn stream(
        &self,
        prompt: String,
        timeout: Duration,
        max_retries: u32,
        cancel: CancellationToken,
    ) -> CoreResult<LlmStream> {
        let connect = tokio::time::timeout(
            timeout,
            retry_with_backoff(max_retries, |_attempt| self.attempt_connect(&prompt)),
        )
        .await;

        let response = match connect {
            Err(_elapsed) => return Err(CoreError::Timeout(timeout)),
            Ok(Err(attempt_err)) => return Err(CoreError::LLMUnavailable(attempt_err.message)),
            Ok(Ok(response)) => response,
        };

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(forward_sse(response, tx, cancel));
        Ok(LlmStream::new(rx))
    }
}

/// Forward an OpenAI-compatible SSE body as text deltas, honoring
/// cancellation. Grounded on `ChannelStreamReceiver::pair` in
/// `src/llms/streaming.rs` for the channel-as-stream shape.
async fn forward_sse(response: reqwest::Response, tx: mpsc::Sender<CoreResult<String>>, cancel: CancellationToken) {
    let mut byte_stream = response.bytes_stream();
    let mut buffer = String::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            next = byte_stream.next() => {
                match next {
                    None => return,
                    Some(Err(e)) => {
                        let _ = tx.send(Err(CoreError::LLMUnavailable(e.to_string()))).await;
                        return;
                    }
                    Some(Ok(bytes)) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        while let Some(newline_pos) = buffer.find('\n') {
                            let line = buffer[..newline_pos].trim().to_string();
                            buffer.drain(..=newline_pos);

                            let Some(payload) = line.strip_prefix("data:") else { continue };
                            let payload = payload.trim();
                            if payload.is_empty() {
                                continue;
                            }
                            if payload == "[DONE]" {
                                return;
                            }

                            if let Ok(value) = serde_json::from_str::<Value>(payload) {
                                if let Some(text) = extract_delta_text(&value) {
                                    if tx.send(Ok(text)).await.is_err() {
                                        return;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn extract_delta_text(value: &Value) -> Option<String> {
    value["choices"][0]["delta"]["content"].as_str().map(str::to_string)
}
