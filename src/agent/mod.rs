//! Agent loop: decision schema, response parsing, conversation history, and
//! the loop controller itself.

mod history;
mod parser;
mod runner;
mod schema;

pub use history::{render_prompt, HistoryRecord};
pub use parser::{parse_decision, Decision};
pub use runner::{AgentRunner, RunResult, ToolCallRecord};
pub use schema::{decision_schema, load_project_context, system_prompt, PROJECT_CONTEXT_FILENAME};
