//! Chat-completions API interaction with optional exponential backoff.
//!
//! Every LLM call in the pipeline (search fallback, translation, report
//! formatting) goes through the [`ChatBackend`] trait:
//! - [`ChatClient`]: Posts to an OpenAI-compatible `/chat/completions` endpoint
//! - [`RetryAsk`]: Decorator that adds retry logic to any `ChatBackend`
//!
//! # Retry Strategy
//!
//! Retrying is off by default (`llm_retries = 0`). When enabled:
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::config::AppConfig;
use crate::error::{DigestError, Result};
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use rand::{Rng, rng};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// A single chat request: one system instruction, one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    /// Enable the provider's web-search plugin.
    pub web_search: bool,
    pub temperature: f32,
    pub top_p: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            web_search: false,
            temperature: 0.1,
            top_p: 0.8,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
        }
    }

    pub fn with_web_search(mut self) -> Self {
        self.web_search = true;
        self
    }

    pub fn with_penalties(mut self, presence: f32, frequency: f32) -> Self {
        self.presence_penalty = presence;
        self.frequency_penalty = frequency;
        self
    }
}

/// Trait for async LLM interaction.
///
/// Implementors send a [`ChatRequest`] and return the assistant message text.
/// This abstraction allows different backends, decorators (like retry logic)
/// and in-memory fakes in tests.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: [WireMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    plugins: Option<[&'static str; 1]>,
    stream: bool,
    temperature: f32,
    top_p: f32,
    presence_penalty: f32,
    frequency_penalty: f32,
}

impl<'a> CompletionBody<'a> {
    fn new(model: &'a str, request: &'a ChatRequest) -> Self {
        Self {
            model,
            messages: [
                WireMessage {
                    role: "system",
                    content: &request.system,
                },
                WireMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            plugins: request.web_search.then_some(["websearch"]),
            stream: false,
            temperature: request.temperature,
            top_p: request.top_p,
            presence_penalty: request.presence_penalty,
            frequency_penalty: request.frequency_penalty,
        }
    }
}

/// Pull `choices[0].message.content` out of a completion response.
fn extract_content(body: &Value) -> Result<String> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DigestError::upstream(200, "Invalid API response format"))
}

/// Pull the provider's error message out of a failed response body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "Unknown error".to_string())
}

/// reqwest client for an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ChatClient {
    pub fn new(http: reqwest::Client, config: &AppConfig) -> Self {
        Self {
            http,
            base_url: config.llm_base_url.clone(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
        }
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    #[instrument(level = "info", skip_all, fields(model = %self.model, web_search = request.web_search))]
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let t0 = Instant::now();
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&CompletionBody::new(&self.model, request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_error_message(&body);
            warn!(
                status = status.as_u16(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                %message,
                "Chat completion failed"
            );
            return Err(DigestError::upstream(status.as_u16(), message));
        }

        let body: Value = response.json().await?;
        let content = extract_content(&body)?;
        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            preview = %truncate_for_log(&content, 200),
            "Chat completion succeeded"
        );
        Ok(content)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`ChatBackend`].
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying client to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: ChatBackend,
{
    /// Create a new retry wrapper around an existing [`ChatBackend`].
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = ChatClient::new(http, &config);
    /// let retry_client = RetryAsk::new(client, 3, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

#[async_trait]
impl<T> ChatBackend for RetryAsk<T>
where
    T: ChatBackend,
{
    #[instrument(level = "info", skip_all)]
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.complete(request).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "complete() exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let factor = 1u32.checked_shl((attempt - 1) as u32).unwrap_or(u32::MAX);
                    let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "complete() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Build the chat backend described by `config`, wrapping it in [`RetryAsk`]
/// when retries are enabled.
pub fn build_chat_backend(http: reqwest::Client, config: &AppConfig) -> Arc<dyn ChatBackend> {
    let client = ChatClient::new(http, config);
    if config.llm_retries == 0 {
        Arc::new(client)
    } else {
        info!(retries = config.llm_retries, "Chat retries enabled");
        Arc::new(RetryAsk::new(
            client,
            config.llm_retries,
            StdDuration::from_secs(1),
        ))
    }
}
