//! Retry policy for gateway calls.
//!
//! Retry is an explicit, separately testable layer: the agent loop itself
//! never retries a failed gateway call. A caller that wants retries wraps its
//! client in [`RetryingClient`].

use std::time::Duration;

use async_trait::async_trait;

use super::{CompletionClient, CompletionRequest, CompletionResponse};

/// Coarse classification of a gateway failure string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Request or connection timeout. Transient.
    Timeout,
    /// Connection-level transport failure. Transient.
    Transport,
    /// HTTP 429 from the gateway. Transient, backs off harder.
    RateLimited,
    /// HTTP 5xx from the gateway. Transient.
    ServerError,
    /// Everything else: bad credentials, unknown model, malformed envelope.
    /// Permanent; retrying the same request will not help.
    Permanent,
}

impl ErrorClass {
    pub fn is_transient(&self) -> bool {
        !matches!(self, ErrorClass::Permanent)
    }
}

/// Classify a failure string produced by the gateway client.
pub fn classify_error(error: &str) -> ErrorClass {
    if error.contains("timed out") {
        ErrorClass::Timeout
    } else if error.contains("HTTP 429") {
        ErrorClass::RateLimited
    } else if error.contains("HTTP 5") {
        ErrorClass::ServerError
    } else if error.contains("Request failed") {
        ErrorClass::Transport
    } else {
        ErrorClass::Permanent
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the initial call.
    pub max_attempts: u32,
    /// Backoff multiplier between attempts.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            backoff_factor,
        }
    }

    /// Whether the given failure should be retried.
    pub fn should_retry(&self, error: &str, attempt: u32) -> bool {
        attempt < self.max_attempts && classify_error(error).is_transient()
    }

    /// Delay before the given retry attempt (0-based).
    ///
    /// Exponential backoff with a small deterministic jitter, capped at 60s.
    /// Rate limits start from a higher base.
    pub fn delay_for(&self, error: &str, attempt: u32) -> Duration {
        let base_secs = match classify_error(error) {
            ErrorClass::RateLimited => 5.0,
            ErrorClass::ServerError => 2.0,
            _ => 1.0,
        };

        let backed_off = base_secs * self.backoff_factor.powi(attempt as i32);
        let jitter = f64::from(attempt * 7 % 4) / 4.0;
        Duration::from_secs_f64((backed_off + jitter).min(60.0))
    }
}

/// Completion client wrapper that retries transient failures.
pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: CompletionClient> RetryingClient<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<C: CompletionClient> CompletionClient for RetryingClient<C> {
    async fn complete(&self, request: &CompletionRequest) -> CompletionResponse {
        let mut attempt = 0;
        loop {
            let response = self.inner.complete(request).await;
            if response.success {
                return response;
            }

            let error = response.error.as_deref().unwrap_or("unknown error");
            if !self.policy.should_retry(error, attempt) {
                return response;
            }

            let delay = self.policy.delay_for(error, attempt);
            tracing::info!(
                "Transient gateway failure (attempt {}): {}; retrying in {:?}",
                attempt + 1,
                error,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
