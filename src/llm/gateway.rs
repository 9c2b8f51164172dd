//! HTTP gateway client for the remote completion service.
//!
//! The gateway is a form-posting endpoint: credentials travel in the body,
//! the response is a JSON envelope `{status, content, ...}`. Environment
//! variables are read fresh on every call so credentials can be rotated at
//! runtime.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::audit::AuditLogger;

use super::{
    compute_max_tokens, CompletionClient, CompletionRequest, CompletionResponse, TokenParam,
    ALL_MODELS, DEFAULT_MODEL,
};

const API_URL_VAR: &str = "GATEWAY_API_URL";
const API_TOKEN_VAR: &str = "GATEWAY_API_TOKEN";

/// Completion client for the remote gateway.
pub struct GatewayClient {
    http: reqwest::Client,
    audit: AuditLogger,
}

impl GatewayClient {
    pub fn new(audit: AuditLogger) -> Self {
        Self {
            http: reqwest::Client::new(),
            audit,
        }
    }

    /// Send a minimal probe request to verify connectivity.
    pub async fn test_connection(&self, model: Option<&str>) -> CompletionResponse {
        let request = CompletionRequest::new(
            "Say 'Connection OK' and nothing else.",
            model.unwrap_or(DEFAULT_MODEL),
        );
        self.complete(&request).await
    }

    async fn execute(&self, request: &CompletionRequest) -> CompletionResponse {
        let model = request.model.as_str();

        // Fetch credentials fresh each call (allows runtime updates).
        let Ok(api_url) = std::env::var(API_URL_VAR) else {
            return CompletionResponse::failure(
                format!("Missing {} in environment", API_URL_VAR),
                model,
            );
        };
        let Ok(api_token) = std::env::var(API_TOKEN_VAR) else {
            return CompletionResponse::failure(
                format!("Missing {} in environment", API_TOKEN_VAR),
                model,
            );
        };

        if !ALL_MODELS.contains(&model) {
            return CompletionResponse::failure(
                format!("Unknown model: {}. Available: {:?}", model, ALL_MODELS),
                model,
            );
        }

        // The gateway takes a single prompt string; prepend the system prompt.
        let full_prompt = match &request.system_prompt {
            Some(system) => format!("{}\n\n{}", system, request.prompt),
            None => request.prompt.clone(),
        };

        let (token_param, max_tokens) = compute_max_tokens(model, &full_prompt);

        let mut form: Vec<(&str, String)> = vec![
            ("token", api_token),
            ("action", "callAI".to_string()),
            ("format", "json".to_string()),
            ("returnFormat", "json".to_string()),
            ("model", model.to_string()),
            ("model_hint", model.to_string()),
            ("temperature", request.temperature.to_string()),
        ];
        match token_param {
            TokenParam::MaxCompletionTokens => {
                form.push(("max_completion_tokens", max_tokens.to_string()));
            }
            TokenParam::MaxTokens => {
                form.push(("max_tokens", max_tokens.to_string()));
            }
        }
        if let Some(schema) = &request.json_schema {
            form.push(("json_schema", schema.to_string()));
        }
        form.push(("prompt", full_prompt));

        let result = self
            .http
            .post(&api_url)
            .form(&form)
            .timeout(Duration::from_secs(request.timeout_secs))
            .send()
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return CompletionResponse::failure(
                    format!("Request timed out after {}s", request.timeout_secs),
                    model,
                );
            }
            Err(e) => {
                return CompletionResponse::failure(format!("Request failed: {}", e), model);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return CompletionResponse::failure(
                format!("Gateway returned HTTP {}: {}", status.as_u16(), body),
                model,
            );
        }

        let envelope: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                return CompletionResponse::failure(
                    format!("Invalid JSON from gateway: {}", e),
                    model,
                );
            }
        };

        if envelope.get("status").and_then(Value::as_str) != Some("success") {
            return CompletionResponse::failure(
                format!("Gateway returned error: {}", envelope),
                model,
            );
        }

        // Some deployments return the decoded object, others a JSON string.
        let content = envelope.get("content").cloned().unwrap_or(json!(""));
        CompletionResponse::ok(content, model)
    }
}

#[async_trait]
impl CompletionClient for GatewayClient {
    async fn complete(&self, request: &CompletionRequest) -> CompletionResponse {
        let start = Instant::now();
        let response = self.execute(request).await;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        let inputs = json!({
            "model": request.model,
            "temperature": request.temperature,
            "prompt_length": request.prompt.len(),
            "has_system_prompt": request.system_prompt.is_some(),
            "has_json_schema": request.json_schema.is_some(),
        });
        let output = match &response.error {
            Some(error) => json!({ "error": error }),
            None => json!({ "content_length": response.content.to_string().len() }),
        };
        self.audit
            .log("ai_chat", inputs, output, response.success, Some(duration_ms));

        if !response.success {
            tracing::warn!(
                "Gateway call failed for model {}: {}",
                request.model,
                response.error.as_deref().unwrap_or("unknown error")
            );
        }

        response
    }
}
