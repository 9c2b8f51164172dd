//! Tool system for the agent.
//!
//! Ten operations over the filesystem and shell, each a stateless async
//! function from a validated argument struct to a JSON result. The uniform
//! result shape is the contract the agent loop depends on: success results
//! carry tool-specific fields, failures carry an `error` string key. Tool
//! failures are data, never thrown faults.

mod file_ops;
mod patch;
mod scan;
mod search;
mod terminal;

pub use file_ops::{copy, delete, edit, move_path, read, write};
pub use patch::apply;
pub use scan::scan;
pub use search::search;
pub use terminal::run;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

/// The closed set of tool identifiers the model may request.
pub const TOOL_NAMES: &[&str] = &[
    "scan", "search", "read", "write", "edit", "apply", "run", "delete", "move", "copy",
];

/// Failure classification for tool errors.
///
/// The kind never reaches the model (only the message does); it exists for
/// audit categorization and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    NotFound,
    InvalidArgs,
    Conflict,
    Blocked,
    Timeout,
    Io,
    Failed,
}

/// A tool failure, always surfaced to the loop as `{"error": message}`.
#[derive(Debug, Clone)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::NotFound, message)
    }

    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidArgs, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Conflict, message)
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Blocked, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Io, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Failed, message)
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ToolError {}

/// Every tool returns a JSON mapping on success or a [`ToolError`].
pub type ToolResult = Result<Value, ToolError>;

/// Limits and safety switches the dispatcher passes down from config.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Default cap for the apply tool when the model omits `max_files`.
    pub max_patch_files: usize,
    /// Reject shell commands matching the dangerous-pattern list.
    pub block_dangerous_commands: bool,
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            max_patch_files: 5,
            block_dangerous_commands: true,
        }
    }
}

impl ToolContext {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            max_patch_files: config.max_files_touched_per_run,
            block_dangerous_commands: config.block_dangerous_commands,
        }
    }
}

/// Normalize tool arguments into a string-keyed mapping.
///
/// Some gateway integrations return `null` or an empty array where an object
/// is expected; both collapse to an empty mapping, as does any other
/// non-object value. Applied before arguments are used anywhere.
pub fn normalize_args(args: Value) -> Map<String, Value> {
    match args {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn decode<T: DeserializeOwned>(args: Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args))
        .map_err(|e| ToolError::invalid_args(format!("Invalid tool arguments: {}", e)))
}

/// Execute a tool by name with raw arguments from the model.
///
/// Always returns a mapping; an unknown name is a normal, reportable outcome
/// (`{"error": "Unknown tool: ..."}`), not a fatal condition.
pub async fn dispatch(name: &str, args: Value, ctx: &ToolContext) -> Value {
    match run_tool(name, args, ctx).await {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("Tool {} failed ({:?}): {}", name, e.kind, e.message);
            json!({ "success": false, "error": e.message })
        }
    }
}

async fn run_tool(name: &str, args: Value, ctx: &ToolContext) -> ToolResult {
    let args = normalize_args(args);

    match name {
        "scan" => scan(decode(args)?),
        "search" => search(decode(args)?),
        "read" => read(decode(args)?).await,
        "write" => write(decode(args)?).await,
        "edit" => edit(decode(args)?).await,
        "delete" => delete(decode(args)?).await,
        "move" => move_path(decode(args)?).await,
        "copy" => copy(decode(args)?).await,
        "run" => run(decode(args)?, ctx.block_dangerous_commands).await,
        "apply" => apply(decode(args)?, ctx.max_patch_files).await,
        other => Err(ToolError::not_found(format!("Unknown tool: {}", other))),
    }
}
