//! Structured JSON-lines audit logging.
//!
//! Every tool invocation and gateway call is appended as one JSON object per
//! line to `{log_dir}/codequill_YYYY-MM-DD.jsonl`. Writes are fire-and-forget:
//! a failed append is traced, never propagated to the caller.
//!
//! Records are sanitized before persisting: values under sensitive key names
//! are redacted and oversized strings/arrays are truncated.

use std::path::PathBuf;

use chrono::Utc;
use serde_json::{json, Map, Value};

/// Key-name fragments whose values are redacted.
///
/// `max_tokens` / `max_completion_tokens` are exempt even though they contain
/// the `token` fragment.
const SENSITIVE_FRAGMENTS: &[&str] = &["password", "secret", "credential", "api_key", "token"];

const EXEMPT_KEYS: &[&str] = &["max_tokens", "max_completion_tokens"];

/// Maximum string length kept in logged inputs.
const MAX_INPUT_STR: usize = 500;

/// Maximum string length kept in logged outputs.
const MAX_OUTPUT_STR: usize = 2000;

/// Maximum array length kept in logged outputs.
const MAX_OUTPUT_LIST: usize = 20;

/// Append-only audit logger handle.
///
/// Cheap to clone; clones share the same log directory. The log file itself
/// supports concurrent append from multiple runs (one record per line, no
/// read-modify-write).
#[derive(Debug, Clone)]
pub struct AuditLogger {
    log_dir: PathBuf,
}

impl AuditLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// Log one action. Never fails; IO errors are traced and dropped.
    pub fn log(
        &self,
        action: &str,
        inputs: Value,
        output: Value,
        success: bool,
        duration_ms: Option<f64>,
    ) {
        let mut entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "action": action,
            "inputs": sanitize_inputs(inputs),
            "output": truncate_output(output),
            "success": success,
        });
        if let Some(ms) = duration_ms {
            entry["duration_ms"] = json!((ms * 100.0).round() / 100.0);
        }

        if let Err(e) = self.append_line(&entry) {
            tracing::warn!("Failed to write audit log entry: {}", e);
        }
    }

    /// Today's log file path (UTC date).
    pub fn log_file(&self) -> PathBuf {
        let date = Utc::now().format("%Y-%m-%d");
        self.log_dir.join(format!("codequill_{}.jsonl", date))
    }

    fn append_line(&self, entry: &Value) -> std::io::Result<()> {
        use std::io::Write;

        std::fs::create_dir_all(&self.log_dir)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_file())?;
        writeln!(file, "{}", entry)
    }
}

/// Redact sensitive keys and truncate long strings in logged inputs.
fn sanitize_inputs(inputs: Value) -> Value {
    let Value::Object(map) = inputs else {
        return inputs;
    };

    let mut sanitized = Map::new();
    for (key, value) in map {
        let lower = key.to_lowercase();
        if EXEMPT_KEYS.contains(&lower.as_str()) {
            sanitized.insert(key, value);
        } else if SENSITIVE_FRAGMENTS.iter().any(|s| lower.contains(s)) {
            sanitized.insert(key, json!("[REDACTED]"));
        } else if let Value::String(s) = &value {
            if s.len() > MAX_INPUT_STR {
                sanitized.insert(key, json!(format!("{}...[truncated]", &s[..MAX_INPUT_STR])));
            } else {
                sanitized.insert(key, value);
            }
        } else {
            sanitized.insert(key, value);
        }
    }
    Value::Object(sanitized)
}

/// Truncate oversized string/array fields in logged outputs.
fn truncate_output(output: Value) -> Value {
    let Value::Object(map) = output else {
        return output;
    };

    let mut truncated = Map::new();
    for (key, value) in map {
        match value {
            Value::String(s) if s.len() > MAX_OUTPUT_STR => {
                let total = s.len();
                truncated.insert(
                    key,
                    json!(format!(
                        "{}...[truncated, total {} chars]",
                        &s[..MAX_OUTPUT_STR],
                        total
                    )),
                );
            }
            Value::Array(items) if items.len() > MAX_OUTPUT_LIST => {
                let total = items.len();
                let head: Vec<Value> = items.into_iter().take(MAX_OUTPUT_LIST).collect();
                truncated.insert(format!("{}_truncated", key), json!(true));
                truncated.insert(format!("{}_total", key), json!(total));
                truncated.insert(key, json!(head));
            }
            other => {
                truncated.insert(key, other);
            }
        }
    }
    Value::Object(truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_sensitive_keys() {
        let sanitized = sanitize_inputs(json!({
            "api_key": "sk-12345",
            "user_password": "hunter2",
            "model": "o1",
        }));
        assert_eq!(sanitized["api_key"], "[REDACTED]");
        assert_eq!(sanitized["user_password"], "[REDACTED]");
        assert_eq!(sanitized["model"], "o1");
    }

    #[test]
    fn token_limits_are_exempt_from_redaction() {
        let sanitized = sanitize_inputs(json!({
            "max_tokens": 32000,
            "max_completion_tokens": 100000,
            "token": "abc",
        }));
        assert_eq!(sanitized["max_tokens"], 32000);
        assert_eq!(sanitized["max_completion_tokens"], 100000);
        assert_eq!(sanitized["token"], "[REDACTED]");
    }

    #[test]
    fn truncates_long_input_strings() {
        let long = "x".repeat(600);
        let sanitized = sanitize_inputs(json!({ "prompt": long }));
        let logged = sanitized["prompt"].as_str().unwrap();
        assert!(logged.len() < 600);
        assert!(logged.ends_with("...[truncated]"));
    }

    #[test]
    fn truncates_output_arrays_with_companion_keys() {
        let items: Vec<i64> = (0..30).collect();
        let truncated = truncate_output(json!({ "matches": items }));
        assert_eq!(truncated["matches"].as_array().unwrap().len(), 20);
        assert_eq!(truncated["matches_truncated"], true);
        assert_eq!(truncated["matches_total"], 30);
    }

    #[test]
    fn writes_one_json_record_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditLogger::new(dir.path());

        logger.log("scan", json!({"path": "."}), json!({"total_files": 4}), true, Some(1.5));
        logger.log("read", json!({"path": "x"}), json!({"error": "missing"}), false, None);

        let contents = std::fs::read_to_string(logger.log_file()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let entry: Value = serde_json::from_str(line).unwrap();
            assert!(entry["action"].is_string());
            assert!(entry["success"].is_boolean());
        }
    }
}
