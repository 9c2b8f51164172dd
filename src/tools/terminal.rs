//! Shell command execution tool.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tokio::process::Command;

use super::{ToolError, ToolResult};

/// Captured stdout/stderr are each capped at this many characters.
const OUTPUT_CAP: usize = 10_000;

/// Command prefixes that are rejected when dangerous-command blocking is on.
/// These either destroy data or walk the entire filesystem.
const DANGEROUS_PATTERNS: &[(&str, &str)] = &[
    ("rm -rf /", "This would destroy the entire system"),
    ("rm -rf /*", "This would destroy the entire system"),
    ("> /dev/", "Writing to device files is blocked"),
    ("dd if=/dev/", "Direct disk operations are blocked"),
    ("find /", "Scope the find to a specific directory instead of the filesystem root"),
    ("grep -r /", "Scope the grep to a specific directory instead of the filesystem root"),
    ("grep -rn /", "Scope the grep to a specific directory instead of the filesystem root"),
    ("du -sh /", "Use a specific directory path instead of root"),
];

/// Validate a command against the dangerous-pattern list, including after
/// common wrapper prefixes (`sudo`, `time`, `nice`, `nohup`).
fn validate_command(cmd: &str) -> Result<(), String> {
    let trimmed = cmd.trim();

    for (pattern, reason) in DANGEROUS_PATTERNS {
        if trimmed.starts_with(pattern) {
            return Err(format!(
                "Blocked dangerous command pattern '{}'. {}",
                pattern, reason
            ));
        }
        for prefix in ["sudo ", "time ", "nice ", "nohup "] {
            if let Some(rest) = trimmed.strip_prefix(prefix) {
                if rest.starts_with(pattern) {
                    return Err(format!(
                        "Blocked dangerous command pattern '{}'. {}",
                        pattern, reason
                    ));
                }
            }
        }
    }

    Ok(())
}

fn clip_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn default_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize)]
pub struct RunArgs {
    #[serde(default)]
    pub command: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub cwd: Option<String>,
}

/// Run a shell command and capture its output.
///
/// A timeout is reported as `exit_code: -1` with a message in stderr, not as
/// an error: the model decides how to react.
pub async fn run(args: RunArgs, block_dangerous: bool) -> ToolResult {
    if block_dangerous {
        if let Err(msg) = validate_command(&args.command) {
            tracing::warn!("Blocked dangerous command: {}", args.command);
            return Err(ToolError::blocked(msg));
        }
    }

    let work_dir = match &args.cwd {
        Some(cwd) => PathBuf::from(cwd).canonicalize().map_err(|_| {
            ToolError::not_found(format!("Working directory does not exist: {}", cwd))
        })?,
        None => std::env::current_dir()
            .map_err(|e| ToolError::io(format!("Cannot determine working directory: {}", e)))?,
    };

    tracing::debug!("Executing command in {:?}: {}", work_dir, args.command);

    let output = tokio::time::timeout(
        Duration::from_secs(args.timeout),
        Command::new("/bin/sh")
            .arg("-c")
            .arg(&args.command)
            .current_dir(&work_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output(),
    )
    .await;

    let cwd_str = work_dir.display().to_string();

    match output {
        Ok(Ok(output)) => Ok(json!({
            "command": args.command,
            "cwd": cwd_str,
            "exit_code": output.status.code().unwrap_or(-1),
            "stdout": clip_chars(&String::from_utf8_lossy(&output.stdout), OUTPUT_CAP),
            "stderr": clip_chars(&String::from_utf8_lossy(&output.stderr), OUTPUT_CAP),
        })),
        Ok(Err(e)) => Ok(json!({
            "command": args.command,
            "cwd": cwd_str,
            "exit_code": -1,
            "stdout": "",
            "stderr": format!("Failed to execute command: {}", e),
        })),
        Err(_) => Ok(json!({
            "command": args.command,
            "cwd": cwd_str,
            "exit_code": -1,
            "stdout": "",
            "stderr": format!("Command timed out after {}s", args.timeout),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_destructive_patterns() {
        assert!(validate_command("rm -rf /").is_err());
        assert!(validate_command("sudo rm -rf /").is_err());
        assert!(validate_command("dd if=/dev/sda of=out").is_err());
        assert!(validate_command("find / -name foo").is_err());
    }

    #[test]
    fn allows_scoped_commands() {
        assert!(validate_command("ls -la src/").is_ok());
        assert!(validate_command("rm -rf build/").is_ok());
        assert!(validate_command("find src/ -name '*.rs'").is_ok());
        assert!(validate_command("grep -rn pattern src/").is_ok());
    }
}
