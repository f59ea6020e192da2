//! LLM API interaction with exponential backoff retry logic.
//!
//! This module provides the interface for talking to OpenAI-compatible chat
//! completion endpoints (the AI gateway for topic metadata, Perplexity for
//! trending topics). It includes automatic retry logic with exponential
//! backoff and jitter to handle transient failures gracefully.
//!
//! # Architecture
//!
//! The module uses a trait-based design for flexibility:
//! - [`AskAsync`]: Core trait defining async LLM interaction
//! - [`ChatClient`]: Posts a single chat completion request over `reqwest`
//! - [`RetryAsk`]: Decorator that adds retry logic to any `AskAsync` implementation
//!
//! # Retry Strategy
//!
//! - Retry count and delays come from [`GatewaySettings`]
//! - Exponential backoff: `min(base * 2^(attempt-1), max)`
//! - Random jitter (0-250ms) added to prevent thundering herd
//! - Validation failures (4xx, "Topic is required", "Invalid request") are
//!   returned immediately without retrying

use crate::config::GatewaySettings;
use crate::error::GatewayError;
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Trait for async LLM interaction.
///
/// Implementors of this trait can send text to an LLM and receive a response.
/// This abstraction allows for different LLM backends or decorators (like retry logic).
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    ///
    /// # Arguments
    ///
    /// * `text` - The user message to send to the LLM
    ///
    /// # Returns
    ///
    /// The LLM's response, or an error if the request failed.
    async fn ask(&self, text: &str) -> Result<Self::Response, GatewayError>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// # Backoff Strategy
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying LLM client to wrap.
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
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Arguments
    ///
    /// * `inner` - The underlying LLM client to wrap
    /// * `max_retries` - Maximum number of retry attempts
    /// * `base_delay` - Initial delay between retries
    /// * `max_delay` - Upper bound on any single delay (before jitter)
    ///
    /// # Example
    ///
    /// ```ignore
    /// let retry_client = RetryAsk::new(client, 2, Duration::from_millis(500), Duration::from_secs(4));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration, max_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        self.base_delay
            .saturating_mul(1 << shift)
            .min(self.max_delay)
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

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, GatewayError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) if e.is_non_retryable() => {
                    warn!(error = %e, "ask() failed with a non-retryable error");
                    return Err(e);
                }
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
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = self.backoff(attempt) + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// A single-turn client for an OpenAI-compatible `/chat/completions` endpoint.
///
/// Sends an optional system prompt (skipped when empty) plus the user text
/// and returns the first choice's message content. An optional
/// `response_format` (for example a JSON schema) is passed through verbatim.
pub struct ChatClient<'a> {
    pub http: &'a Client,
    pub url: &'a str,
    pub api_key: &'a str,
    pub model: &'a str,
    pub temperature: f32,
    pub system_prompt: &'a str,
    pub response_format: Option<Value>,
}

impl fmt::Debug for ChatClient<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("url", &self.url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl AskAsync for ChatClient<'_> {
    type Response = String;

    #[instrument(level = "info", skip_all, fields(model = self.model))]
    async fn ask(&self, text: &str) -> Result<Self::Response, GatewayError> {
        let t0 = Instant::now();

        let mut messages = Vec::with_capacity(2);
        if !self.system_prompt.is_empty() {
            messages.push(json!({ "role": "system", "content": self.system_prompt }));
        }
        messages.push(json!({ "role": "user", "content": text }));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });
        if let Some(format) = &self.response_format {
            body["response_format"] = format.clone();
        }

        let response = self
            .http
            .post(self.url)
            .bearer_auth(self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                body = %truncate_for_log(&body, 300),
                "API call failed"
            );
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletion = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(GatewayError::EmptyCompletion)
    }
}

/// High-level function to call an LLM with exponential backoff retry logic.
///
/// # Arguments
///
/// * `client` - The configured chat client
/// * `settings` - Retry count and delay bounds
/// * `text` - The user message
///
/// # Returns
///
/// The completion text, or the last error once retries are exhausted (or
/// immediately, for validation failures).
#[instrument(level = "info", skip_all)]
pub async fn ask_with_backoff(
    client: ChatClient<'_>,
    settings: &GatewaySettings,
    text: &str,
) -> Result<String, GatewayError> {
    let t0 = Instant::now();
    let api = RetryAsk::new(
        client,
        settings.max_retries,
        StdDuration::from_millis(settings.base_delay_ms),
        StdDuration::from_millis(settings.max_delay_ms),
    );
    let res = api.ask(text).await;
    let dt = t0.elapsed();

    match &res {
        Ok(_) => info!(
            elapsed_ms_total = dt.as_millis() as u64,
            "ask_with_backoff succeeded"
        ),
        Err(e) => {
            error!(elapsed_ms_total = dt.as_millis() as u64, error = %e, "ask_with_backoff failed")
        }
    }
    res
}
