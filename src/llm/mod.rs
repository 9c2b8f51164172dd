//! Completion gateway client module.
//!
//! Provides a trait-based abstraction over the remote chat-completion
//! service, with the form-posting [`GatewayClient`] as the primary
//! implementation. Gateway failures are data, not errors: `complete` always
//! returns a [`CompletionResponse`] and the caller inspects `success`.

mod gateway;
mod retry;

pub use gateway::GatewayClient;
pub use retry::{classify_error, ErrorClass, RetryPolicy, RetryingClient};

use async_trait::async_trait;
use serde_json::Value;

/// Default model for agentic code tasks.
pub const DEFAULT_MODEL: &str = "o1";

/// Models suitable for agentic loops: they support JSON-schema enforced
/// structured output.
pub const AGENTIC_MODELS: &[&str] = &["gpt-4.1", "gpt-5", "o1", "o3-mini"];

/// All routable models, including ones without schema support.
pub const ALL_MODELS: &[&str] = &[
    "gpt-4.1",
    "gpt-5",
    "o1",
    "o3-mini",
    "gpt-4o",
    "claude",
    "deepseek",
];

/// Which request parameter carries the output token limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenParam {
    MaxTokens,
    MaxCompletionTokens,
}

impl TokenParam {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenParam::MaxTokens => "max_tokens",
            TokenParam::MaxCompletionTokens => "max_completion_tokens",
        }
    }
}

/// Static per-model limits used for output token budgeting.
#[derive(Debug, Clone, Copy)]
pub struct ModelSpec {
    pub context_window: usize,
    pub output_max: usize,
    pub token_param: TokenParam,
    /// Tokens reserved on top of the prompt estimate (reasoning models need
    /// a much larger buffer).
    pub buffer: usize,
}

/// Look up the spec for a known model.
pub fn model_spec(model: &str) -> Option<ModelSpec> {
    let spec = match model {
        "o1" => ModelSpec {
            context_window: 200_000,
            output_max: 100_000,
            token_param: TokenParam::MaxCompletionTokens,
            buffer: 25_000,
        },
        "o3-mini" => ModelSpec {
            context_window: 200_000,
            output_max: 100_000,
            token_param: TokenParam::MaxCompletionTokens,
            buffer: 25_000,
        },
        "gpt-4.1" => ModelSpec {
            context_window: 1_000_000,
            output_max: 128_000,
            token_param: TokenParam::MaxTokens,
            buffer: 2_000,
        },
        "gpt-5" => ModelSpec {
            context_window: 400_000,
            output_max: 128_000,
            token_param: TokenParam::MaxTokens,
            buffer: 2_000,
        },
        _ => return None,
    };
    Some(spec)
}

/// Rough token estimate: ~4 characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() + 3) / 4
}

/// Compute the output token budget for a prompt against a model's limits.
///
/// Unknown models fall back to `max_tokens = 32000`. The result is clamped
/// to the model's output maximum and floored at 512.
pub fn compute_max_tokens(model: &str, prompt: &str) -> (TokenParam, usize) {
    let Some(spec) = model_spec(model) else {
        return (TokenParam::MaxTokens, 32_000);
    };

    let prompt_tokens = estimate_tokens(prompt);
    let available = spec
        .context_window
        .saturating_sub(prompt_tokens)
        .saturating_sub(spec.buffer);
    let budget = available.min(spec.output_max).max(512);

    tracing::debug!(
        "Token budget for {}: prompt~{} tokens, output {}",
        model,
        prompt_tokens,
        budget
    );

    (spec.token_param, budget)
}

/// One completion request to the gateway.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub json_schema: Option<Value>,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            system_prompt: None,
            json_schema: None,
            temperature: 0.2,
            timeout_secs: 120,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.json_schema = Some(schema);
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Result of one completion call.
///
/// `content` is usually a JSON string, but some gateway deployments return
/// the decoded object directly; callers must handle both.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub success: bool,
    pub content: Value,
    pub model: String,
    pub error: Option<String>,
}

impl CompletionResponse {
    pub fn ok(content: Value, model: impl Into<String>) -> Self {
        Self {
            success: true,
            content,
            model: model.into(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            success: false,
            content: Value::String(String::new()),
            model: model.into(),
            error: Some(error.into()),
        }
    }
}

/// Trait for completion clients.
///
/// Remote failures are reported in-band (`success = false`); implementations
/// never panic or return a transport error to the loop.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> CompletionResponse;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn unknown_model_gets_fallback_budget() {
        let (param, budget) = compute_max_tokens("mystery-model", "hello");
        assert_eq!(param, TokenParam::MaxTokens);
        assert_eq!(budget, 32_000);
    }

    #[test]
    fn reasoning_model_uses_completion_token_param() {
        let (param, budget) = compute_max_tokens("o1", "hello");
        assert_eq!(param, TokenParam::MaxCompletionTokens);
        assert_eq!(budget, 100_000);
    }

    #[test]
    fn huge_prompt_floors_at_minimum_budget() {
        let prompt = "x".repeat(4 * 200_000);
        let (_, budget) = compute_max_tokens("o1", &prompt);
        assert_eq!(budget, 512);
    }

    #[test]
    fn agentic_models_are_a_subset_of_all_models() {
        for model in AGENTIC_MODELS {
            assert!(ALL_MODELS.contains(model));
            assert!(model_spec(model).is_some());
        }
    }
}
