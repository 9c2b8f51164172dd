//! Unified-diff patch application tool.
//!
//! Safety checks before anything touches the tree: every target file must
//! already exist (no implicit file creation), the patch may not touch more
//! files than the configured cap, and a dry run must pass before the real
//! apply.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tokio::process::Command;

use super::{ToolError, ToolResult};

/// Both the dry run and the real apply are bounded by this timeout.
const PATCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct ApplyArgs {
    #[serde(default)]
    pub patch_path: String,
    #[serde(default)]
    pub max_files: Option<usize>,
}

/// Extract target file paths from unified-diff `---` header lines.
///
/// Strips the conventional `a/` prefix and drops `/dev/null` entries
/// (new-file markers).
pub fn files_in_patch(patch_content: &str) -> Vec<String> {
    // --- a/path or --- path, optionally followed by a tab and a timestamp.
    let header = Regex::new(r"(?m)^---\s+(?:a/)?(.+?)(?:\t|$)").expect("valid header regex");

    header
        .captures_iter(patch_content)
        .map(|c| c[1].to_string())
        .filter(|f| f != "/dev/null")
        .collect()
}

/// Apply a unified diff patch file.
pub async fn apply(args: ApplyArgs, default_max_files: usize) -> ToolResult {
    let max_files = args.max_files.unwrap_or(default_max_files);

    let ppath = Path::new(&args.patch_path)
        .canonicalize()
        .map_err(|_| ToolError::not_found(format!("Patch file does not exist: {}", args.patch_path)))?;

    let patch_content = tokio::fs::read_to_string(&ppath)
        .await
        .map_err(|e| ToolError::io(format!("Cannot read patch file: {}", e)))?;

    let files = files_in_patch(&patch_content);

    if files.is_empty() {
        return Err(ToolError::failed("No valid files found in patch"));
    }

    if files.len() > max_files {
        return Err(ToolError::blocked(format!(
            "Patch touches {} files ({}), exceeds max_files_touched_per_run={}",
            files.len(),
            files.join(", "),
            max_files
        )));
    }

    let missing: Vec<&String> = files.iter().filter(|f| !Path::new(f).exists()).collect();
    if !missing.is_empty() {
        return Err(ToolError::not_found(format!(
            "Target files do not exist: {:?}",
            missing
        )));
    }

    // Dry run first; only a clean dry run is applied for real.
    let dry = run_patch(&ppath, true).await?;
    if !dry.status.success() {
        return Err(ToolError::failed(format!(
            "Dry-run failed: {}",
            stderr_or_stdout(&dry)
        )));
    }

    let real = run_patch(&ppath, false).await?;
    if !real.status.success() {
        return Err(ToolError::failed(format!(
            "Apply failed: {}",
            stderr_or_stdout(&real)
        )));
    }

    Ok(json!({
        "success": true,
        "files_touched": files,
        "output": String::from_utf8_lossy(&real.stdout),
    }))
}

async fn run_patch(ppath: &Path, dry_run: bool) -> Result<std::process::Output, ToolError> {
    let mut cmd = Command::new("patch");
    cmd.arg("-p1");
    if dry_run {
        cmd.arg("--dry-run");
    }
    cmd.arg("-i")
        .arg(ppath)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    match tokio::time::timeout(PATCH_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ToolError::failed("patch command not found on system"))
        }
        Ok(Err(e)) => Err(ToolError::io(format!("Cannot run patch: {}", e))),
        Err(_) => Err(ToolError::new(
            super::ToolErrorKind::Timeout,
            "Patch command timed out",
        )),
    }
}

fn stderr_or_stdout(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout).into_owned()
    } else {
        stderr.into_owned()
    }
}
