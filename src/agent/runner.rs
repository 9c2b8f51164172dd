//! The agent loop controller.
//!
//! Owns the conversation history and the iteration/tool-call budgets, and
//! drives the gateway → parse → dispatch cycle until a terminal outcome.
//!
//! The loop is a four-state machine: it stays `RUNNING` across iterations and
//! exits through exactly one of `DONE_SUCCESS` (the model declared
//! completion), `DONE_MAX_ITERATIONS` (an exhausted budget), or
//! `DONE_FATAL_ERROR` (gateway transport failure). Every exit produces a
//! [`RunResult`] and an audit record.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};

use crate::audit::AuditLogger;
use crate::config::Config;
use crate::llm::{CompletionClient, CompletionRequest, AGENTIC_MODELS};
use crate::tools::{dispatch, ToolContext};

use super::history::{render_prompt, HistoryRecord};
use super::parser::{parse_decision, Decision};
use super::schema::{decision_schema, system_prompt};

/// System nudge appended when the model's output fails to parse.
const REFORMAT_NUDGE: &str =
    "Invalid response format. Please respond with valid JSON matching the schema.";

/// Tool results are summarized to this length in the audit trail.
const RESULT_SUMMARY_LEN: usize = 200;

/// One executed tool call. Immutable once recorded.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub args: Value,
    pub result_summary: String,
}

/// Terminal value of one agent run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub success: bool,
    /// Final answer or a human-readable failure description.
    pub result: String,
    /// Gateway calls made.
    pub iterations: usize,
    pub tool_calls: Vec<ToolCallRecord>,
}

fn clip_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let clipped: String = s.chars().take(max).collect();
        format!("{}...", clipped)
    }
}

/// Drives the agentic loop for one task at a time.
///
/// Each `run` owns its history and counters exclusively; concurrent runs need
/// independent runner instances (they may share the client and logger
/// handles).
pub struct AgentRunner {
    config: Config,
    client: Arc<dyn CompletionClient>,
    audit: AuditLogger,
}

impl AgentRunner {
    pub fn new(config: Config, client: Arc<dyn CompletionClient>, audit: AuditLogger) -> Self {
        Self {
            config,
            client,
            audit,
        }
    }

    /// Run the agentic loop for a task until a terminal outcome.
    ///
    /// `model` and `max_iterations` default from config when absent.
    pub async fn run(
        &self,
        task: &str,
        model: Option<&str>,
        max_iterations: Option<usize>,
        verbose: bool,
    ) -> RunResult {
        let start = Instant::now();
        let resolved_model = model.unwrap_or(&self.config.default_model).to_string();
        let max_iterations = max_iterations.unwrap_or(self.config.max_iterations);
        let max_tool_calls = self.config.max_tool_calls_per_session;

        if !AGENTIC_MODELS.contains(&resolved_model.as_str()) {
            return RunResult {
                success: false,
                result: format!(
                    "Model {} not in AGENTIC_MODELS: {:?}",
                    resolved_model, AGENTIC_MODELS
                ),
                iterations: 0,
                tool_calls: Vec::new(),
            };
        }

        let tool_ctx = ToolContext::from_config(&self.config);
        let mut history = vec![HistoryRecord::user(task)];
        let mut tool_calls: Vec<ToolCallRecord> = Vec::new();
        let mut iteration = 0;

        if verbose {
            println!("[agent] Starting task with model={}", resolved_model);
            println!("[agent] Task: {}\n", task);
        }

        while iteration < max_iterations {
            iteration += 1;

            if verbose {
                println!("[agent] Iteration {}/{}", iteration, max_iterations);
            }

            // Full linear history replayed every turn; serialization happens
            // only here, at the gateway boundary.
            let request = CompletionRequest::new(render_prompt(&history), &resolved_model)
                .with_system_prompt(system_prompt(None))
                .with_schema(decision_schema())
                .with_timeout(self.config.api_timeout_secs);

            let response = self.client.complete(&request).await;

            if !response.success {
                // Gateway transport failure is fatal for the run; retry, if
                // wanted, belongs to a policy layer outside the loop.
                let error = response.error.unwrap_or_else(|| "Unknown error".to_string());
                return self.finish(
                    task,
                    &resolved_model,
                    RunResult {
                        success: false,
                        result: format!("AI call failed: {}", error),
                        iterations: iteration,
                        tool_calls,
                    },
                    start,
                );
            }

            let raw = response.content;
            let text = match &raw {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            history.push(HistoryRecord::assistant(&text));

            if verbose {
                println!("[ai] {}\n", clip_chars(&text, 500));
            }

            let Some(decision) = parse_decision(&raw) else {
                // Malformed decision consumes an iteration but no tool-call
                // budget; the model gets nudged to reformat.
                history.push(HistoryRecord::system(REFORMAT_NUDGE));
                continue;
            };

            if verbose {
                if let Some(thinking) = decision.thinking() {
                    println!("[thinking] {}", thinking);
                }
                println!("[message] {}\n", decision.message());
            }

            match decision {
                Decision::Done { message, .. } => {
                    if verbose {
                        println!("[agent] Task complete.\n");
                    }
                    return self.finish(
                        task,
                        &resolved_model,
                        RunResult {
                            success: true,
                            result: message,
                            iterations: iteration,
                            tool_calls,
                        },
                        start,
                    );
                }
                Decision::ToolCall {
                    tool_name,
                    tool_args,
                    ..
                } => {
                    // Budget check happens before dispatch: at the cap the
                    // tool must not execute.
                    if tool_calls.len() >= max_tool_calls {
                        return self.finish(
                            task,
                            &resolved_model,
                            RunResult {
                                success: false,
                                result: format!("Exceeded max tool calls ({})", max_tool_calls),
                                iterations: iteration,
                                tool_calls,
                            },
                            start,
                        );
                    }

                    let args = Value::Object(tool_args);
                    if verbose {
                        println!("[tool] {}({})", tool_name, args);
                    }

                    let result = dispatch(&tool_name, args.clone(), &tool_ctx).await;

                    if verbose {
                        let display = serde_json::to_string_pretty(&result)
                            .unwrap_or_else(|_| result.to_string());
                        println!("[result] {}\n", clip_chars(&display, 500));
                    }

                    tool_calls.push(ToolCallRecord {
                        name: tool_name.clone(),
                        args,
                        result_summary: clip_chars(&result.to_string(), RESULT_SUMMARY_LEN),
                    });
                    // No early exit: the model sees the result and decides
                    // its next action itself. One tool call per iteration.
                    history.push(HistoryRecord::tool_result(&tool_name, result.to_string()));
                }
            }
        }

        self.finish(
            task,
            &resolved_model,
            RunResult {
                success: false,
                result: format!(
                    "Reached max iterations ({}) without completing task",
                    max_iterations
                ),
                iterations: iteration,
                tool_calls,
            },
            start,
        )
    }

    /// Audit-log a terminal outcome and hand it back.
    fn finish(&self, task: &str, model: &str, result: RunResult, start: Instant) -> RunResult {
        let mut output = json!({
            "iterations": result.iterations,
            "tool_calls": result.tool_calls.len(),
        });
        if !result.success {
            output["error"] = json!(result.result);
        }

        self.audit.log(
            "agent_run",
            json!({ "task": task, "model": model }),
            output,
            result.success,
            Some(start.elapsed().as_secs_f64() * 1000.0),
        );

        tracing::info!(
            "Agent run finished: success={} iterations={} tool_calls={}",
            result.success,
            result.iterations,
            result.tool_calls.len()
        );

        result
    }
}
