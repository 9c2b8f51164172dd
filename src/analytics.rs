//! Usage analytics over the audit log.
//!
//! Reads the JSON-lines files the audit logger produces and summarizes tool
//! usage, error rates, and call latencies into a plain-text report.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::tools::TOOL_NAMES;

/// One parsed audit log entry. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct LogEntry {
    ts: Option<String>,
    action: String,
    #[serde(default)]
    output: serde_json::Value,
    success: bool,
    duration_ms: Option<f64>,
}

/// Aggregated statistics for one tool.
#[derive(Debug, Default)]
pub struct ToolStats {
    pub calls: u64,
    pub errors: u64,
    pub durations_ms: Vec<f64>,
}

impl ToolStats {
    pub fn avg_duration_ms(&self) -> f64 {
        if self.durations_ms.is_empty() {
            0.0
        } else {
            self.durations_ms.iter().sum::<f64>() / self.durations_ms.len() as f64
        }
    }
}

/// Analyzer over the audit log directory.
pub struct LogAnalyzer {
    log_dir: PathBuf,
}

impl LogAnalyzer {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// Load entries from every `.jsonl` file, keeping the last `days` days.
    /// Unreadable files and unparseable lines are skipped.
    fn load_entries(&self, days: i64) -> Vec<LogEntry> {
        let cutoff = Utc::now() - Duration::days(days);
        let mut entries = Vec::new();

        let Ok(dir) = std::fs::read_dir(&self.log_dir) else {
            return entries;
        };

        for file in dir.filter_map(|e| e.ok()) {
            let path = file.path();
            if path.extension().map(|e| e != "jsonl").unwrap_or(true) {
                continue;
            }
            let Ok(contents) = std::fs::read_to_string(&path) else {
                continue;
            };

            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let Ok(entry) = serde_json::from_str::<LogEntry>(line) else {
                    continue;
                };
                let in_window = entry
                    .ts
                    .as_deref()
                    .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                    .map(|ts| ts.with_timezone(&Utc) >= cutoff)
                    .unwrap_or(true);
                if in_window {
                    entries.push(entry);
                }
            }
        }

        entries
    }

    /// Per-tool usage statistics for the window.
    pub fn tool_stats(&self, days: i64) -> BTreeMap<String, ToolStats> {
        let mut stats: BTreeMap<String, ToolStats> = BTreeMap::new();

        for entry in self.load_entries(days) {
            if !TOOL_NAMES.contains(&entry.action.as_str()) {
                continue;
            }
            let tool = stats.entry(entry.action).or_default();
            tool.calls += 1;
            if !entry.success {
                tool.errors += 1;
            }
            if let Some(ms) = entry.duration_ms {
                tool.durations_ms.push(ms);
            }
        }

        stats
    }

    /// Categorize error messages seen in the window.
    pub fn error_categories(&self, days: i64) -> BTreeMap<&'static str, u64> {
        let mut categories: BTreeMap<&'static str, u64> = BTreeMap::new();

        for entry in self.load_entries(days) {
            if entry.success {
                continue;
            }
            let message = entry
                .output
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("")
                .to_lowercase();
            let category = if message.contains("not found") || message.contains("does not exist") {
                "not_found"
            } else if message.contains("permission") {
                "permission"
            } else if message.contains("timed out") || message.contains("timeout") {
                "timeout"
            } else {
                "other"
            };
            *categories.entry(category).or_insert(0) += 1;
        }

        categories
    }

    /// Latency summary across all logged calls in the window.
    pub fn latency_summary(&self, days: i64) -> (f64, f64, f64) {
        let mut durations: Vec<f64> = self
            .load_entries(days)
            .iter()
            .filter_map(|e| e.duration_ms)
            .collect();

        if durations.is_empty() {
            return (0.0, 0.0, 0.0);
        }

        durations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let n = durations.len();
        let avg = durations.iter().sum::<f64>() / n as f64;
        let median = durations[n / 2];
        let p95 = durations[((n as f64 * 0.95) as usize).min(n - 1)];
        (avg, median, p95)
    }

    /// Render the full usage report.
    pub fn report(&self, days: i64) -> String {
        let stats = self.tool_stats(days);
        let categories = self.error_categories(days);
        let (avg, median, p95) = self.latency_summary(days);

        let total_calls: u64 = stats.values().map(|s| s.calls).sum();
        let total_errors: u64 = stats.values().map(|s| s.errors).sum();
        let error_rate = if total_calls > 0 {
            total_errors as f64 / total_calls as f64 * 100.0
        } else {
            0.0
        };

        let mut out = Vec::new();
        out.push("=".repeat(60));
        out.push(format!("codequill Usage Report - Last {} Days", days));
        out.push("=".repeat(60));
        out.push(String::new());

        out.push("TOOL USAGE:".to_string());
        out.push(format!("  Total tool calls: {}", total_calls));
        for (tool, s) in &stats {
            let pct = if total_calls > 0 {
                s.calls as f64 / total_calls as f64 * 100.0
            } else {
                0.0
            };
            out.push(format!(
                "    {}: {} ({:.1}%), avg {:.0}ms",
                tool,
                s.calls,
                pct,
                s.avg_duration_ms()
            ));
        }
        out.push(String::new());

        out.push("ERRORS:".to_string());
        out.push(format!("  Total errors: {}", total_errors));
        out.push(format!("  Error rate: {:.2}%", error_rate));
        for (category, count) in &categories {
            out.push(format!("    {}: {}", category, count));
        }
        out.push(String::new());

        out.push("PERFORMANCE:".to_string());
        out.push(format!("  Avg duration: {:.0}ms", avg));
        out.push(format!("  Median duration: {:.0}ms", median));
        out.push(format!("  P95 duration: {:.0}ms", p95));
        out.push(String::new());
        out.push("=".repeat(60));

        out.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLogger;
    use serde_json::json;

    fn seeded_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditLogger::new(dir.path());
        logger.log("scan", json!({"path": "."}), json!({"total_files": 3}), true, Some(12.0));
        logger.log("scan", json!({"path": "."}), json!({"total_files": 3}), true, Some(8.0));
        logger.log(
            "read",
            json!({"path": "gone.rs"}),
            json!({"error": "File does not exist: gone.rs"}),
            false,
            Some(2.0),
        );
        logger.log("ai_chat", json!({"model": "o1"}), json!({}), true, Some(900.0));
        dir
    }

    #[test]
    fn counts_tool_calls_but_not_gateway_calls() {
        let dir = seeded_dir();
        let stats = LogAnalyzer::new(dir.path()).tool_stats(7);

        assert_eq!(stats["scan"].calls, 2);
        assert_eq!(stats["read"].calls, 1);
        assert_eq!(stats["read"].errors, 1);
        assert!(!stats.contains_key("ai_chat"));
    }

    #[test]
    fn categorizes_errors() {
        let dir = seeded_dir();
        let categories = LogAnalyzer::new(dir.path()).error_categories(7);
        assert_eq!(categories.get("not_found"), Some(&1));
    }

    #[test]
    fn report_renders_sections() {
        let dir = seeded_dir();
        let report = LogAnalyzer::new(dir.path()).report(7);
        assert!(report.contains("TOOL USAGE:"));
        assert!(report.contains("ERRORS:"));
        assert!(report.contains("PERFORMANCE:"));
        assert!(report.contains("scan: 2"));
    }

    #[test]
    fn missing_log_dir_yields_empty_report() {
        let analyzer = LogAnalyzer::new("/nonexistent/audit/logs");
        assert!(analyzer.tool_stats(7).is_empty());
    }
}
