//! Typed conversation history.
//!
//! History is an append-only sequence of typed records owned by one run or
//! chat session; serialization to the flat prompt format happens only at the
//! gateway-call boundary. The full history is replayed every turn with no
//! truncation or summarization.

use serde::{Deserialize, Serialize};

/// One record in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum HistoryRecord {
    User { text: String },
    Assistant { text: String },
    System { text: String },
    ToolResult { tool: String, payload: String },
}

impl HistoryRecord {
    pub fn user(text: impl Into<String>) -> Self {
        HistoryRecord::User { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        HistoryRecord::Assistant { text: text.into() }
    }

    pub fn system(text: impl Into<String>) -> Self {
        HistoryRecord::System { text: text.into() }
    }

    pub fn tool_result(tool: impl Into<String>, payload: impl Into<String>) -> Self {
        HistoryRecord::ToolResult {
            tool: tool.into(),
            payload: payload.into(),
        }
    }

    /// Flat "ROLE: text" form used in the prompt.
    pub fn render(&self) -> String {
        match self {
            HistoryRecord::User { text } => format!("USER: {}", text),
            HistoryRecord::Assistant { text } => format!("ASSISTANT: {}", text),
            HistoryRecord::System { text } => format!("SYSTEM: {}", text),
            HistoryRecord::ToolResult { tool, payload } => {
                format!("TOOL RESULT ({}): {}", tool, payload)
            }
        }
    }
}

/// Serialize the whole history into one prompt blob.
pub fn render_prompt(records: &[HistoryRecord]) -> String {
    records
        .iter()
        .map(HistoryRecord::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_roles_in_order() {
        let records = vec![
            HistoryRecord::user("list files"),
            HistoryRecord::assistant("{\"action\":\"tool_call\"}"),
            HistoryRecord::tool_result("scan", "{\"total_files\":4}"),
            HistoryRecord::system("Invalid response format."),
        ];

        let prompt = render_prompt(&records);
        let expected = "USER: list files\n\nASSISTANT: {\"action\":\"tool_call\"}\n\n\
                        TOOL RESULT (scan): {\"total_files\":4}\n\nSYSTEM: Invalid response format.";
        assert_eq!(prompt, expected);
    }

    #[test]
    fn round_trips_through_serde() {
        let records = vec![
            HistoryRecord::user("hello"),
            HistoryRecord::tool_result("read", "{}"),
        ];
        let encoded = serde_json::to_string(&records).unwrap();
        let decoded: Vec<HistoryRecord> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(records, decoded);
    }
}
