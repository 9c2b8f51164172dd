//! Decision parsing and normalization.
//!
//! Turns raw model output into a canonical [`Decision`]. The gateway may hand
//! back either a JSON string or an already-decoded object; both are accepted.
//! Malformed output yields `None` and the loop nudges the model to reformat.

use regex::Regex;
use serde_json::{Map, Value};

use crate::tools::normalize_args;

/// The model's structured choice for one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    ToolCall {
        tool_name: String,
        tool_args: Map<String, Value>,
        message: String,
        thinking: Option<String>,
    },
    Done {
        message: String,
        thinking: Option<String>,
    },
}

impl Decision {
    pub fn message(&self) -> &str {
        match self {
            Decision::ToolCall { message, .. } => message,
            Decision::Done { message, .. } => message,
        }
    }

    pub fn thinking(&self) -> Option<&str> {
        match self {
            Decision::ToolCall { thinking, .. } => thinking.as_deref(),
            Decision::Done { thinking, .. } => thinking.as_deref(),
        }
    }
}

/// Parse raw model output into a [`Decision`].
///
/// Accepts a JSON string (strictly decoded, with a fenced ```json block as
/// fallback) or an already-decoded object. Returns `None` for anything that
/// fails decoding or field validation. Pure function of its input.
pub fn parse_decision(raw: &Value) -> Option<Decision> {
    let data = match raw {
        Value::Object(map) => map.clone(),
        Value::String(text) => decode_text(text)?,
        _ => return None,
    };
    validate(data)
}

fn decode_text(text: &str) -> Option<Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Some(map);
    }

    // Fallback: first fenced ```json code block.
    let fence = Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("valid fence regex");
    let captured = fence.captures(text)?;
    match serde_json::from_str::<Value>(&captured[1]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn validate(data: Map<String, Value>) -> Option<Decision> {
    // Unknown extra fields are ignored, not an error.
    let action = data.get("action")?.as_str()?;
    let message = data.get("message")?.as_str()?.to_string();
    let thinking = data
        .get("thinking")
        .and_then(Value::as_str)
        .map(str::to_string);

    match action {
        "done" => Some(Decision::Done { message, thinking }),
        "tool_call" => {
            let tool_name = data.get("tool_name")?.as_str()?.to_string();
            // The key must be present; its value is normalized regardless of
            // shape (null or a stray array collapse to an empty mapping).
            let tool_args = normalize_args(data.get("tool_args")?.clone());
            Some(Decision::ToolCall {
                tool_name,
                tool_args,
                message,
                thinking,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_str(text: &str) -> Option<Decision> {
        parse_decision(&Value::String(text.to_string()))
    }

    #[test]
    fn parses_done_response() {
        let decision = parse_str(r#"{"action": "done", "message": "Task complete"}"#).unwrap();
        assert_eq!(
            decision,
            Decision::Done {
                message: "Task complete".to_string(),
                thinking: None
            }
        );
    }

    #[test]
    fn parses_tool_call_with_thinking() {
        let decision = parse_str(
            r#"{"thinking": "look around", "action": "tool_call", "tool_name": "scan",
                "tool_args": {"path": "."}, "message": "Scanning"}"#,
        )
        .unwrap();

        match decision {
            Decision::ToolCall {
                tool_name,
                tool_args,
                message,
                thinking,
            } => {
                assert_eq!(tool_name, "scan");
                assert_eq!(tool_args.get("path"), Some(&json!(".")));
                assert_eq!(message, "Scanning");
                assert_eq!(thinking.as_deref(), Some("look around"));
            }
            other => panic!("expected tool call, got {:?}", other),
        }
    }

    #[test]
    fn accepts_pre_decoded_objects() {
        let raw = json!({"action": "done", "message": "ok"});
        assert!(parse_decision(&raw).is_some());
    }

    #[test]
    fn extracts_fenced_json_block() {
        let text = "Here is my decision:\n```json\n{\"action\": \"done\", \"message\": \"finished\"}\n```\nthanks";
        let decision = parse_str(text).unwrap();
        assert_eq!(decision.message(), "finished");
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_str("This is not JSON").is_none());
    }

    #[test]
    fn rejects_missing_action() {
        assert!(parse_str(r#"{"message": "no action"}"#).is_none());
    }

    #[test]
    fn rejects_missing_message() {
        assert!(parse_str(r#"{"action": "done"}"#).is_none());
    }

    #[test]
    fn rejects_tool_call_without_name_or_args() {
        assert!(parse_str(r#"{"action": "tool_call", "message": "m", "tool_args": {}}"#).is_none());
        assert!(parse_str(r#"{"action": "tool_call", "message": "m", "tool_name": "scan"}"#).is_none());
    }

    #[test]
    fn rejects_unknown_action() {
        assert!(parse_str(r#"{"action": "think", "message": "m"}"#).is_none());
    }

    #[test]
    fn normalizes_null_and_array_tool_args() {
        for args in ["null", "[]", "[1, 2]", "\"x\""] {
            let text = format!(
                r#"{{"action": "tool_call", "tool_name": "scan", "tool_args": {}, "message": "m"}}"#,
                args
            );
            let decision = parse_str(&text).unwrap();
            match decision {
                Decision::ToolCall { tool_args, .. } => assert!(tool_args.is_empty()),
                other => panic!("expected tool call, got {:?}", other),
            }
        }
    }

    #[test]
    fn ignores_unknown_extra_fields() {
        let decision =
            parse_str(r#"{"action": "done", "message": "ok", "confidence": 0.9}"#).unwrap();
        assert_eq!(decision.message(), "ok");
    }
}
