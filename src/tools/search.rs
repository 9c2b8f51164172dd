//! Content search tool: case-insensitive regex over text files.

use std::path::Path;

use regex::RegexBuilder;
use serde::Deserialize;
use serde_json::{json, Value};
use walkdir::WalkDir;

use super::scan::{keep_entry, IgnoreMatcher};
use super::{ToolError, ToolResult};

/// Extensions never searched.
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "pdf", "zip", "tar", "gz", "exe", "dll", "so", "dylib",
    "woff", "woff2", "ttf", "eot", "mp3", "mp4", "mov", "avi",
];

/// Matched lines are clipped to this many characters.
const LINE_CLIP: usize = 200;

fn default_path() -> String {
    ".".to_string()
}

fn default_max_results() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct SearchArgs {
    #[serde(default)]
    pub pattern: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn clip_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Search file contents under a directory for a regex pattern.
///
/// Reports `total_matches` across the whole tree while returning at most
/// `max_results` match records.
pub fn search(args: SearchArgs) -> ToolResult {
    let root = Path::new(&args.path)
        .canonicalize()
        .map_err(|_| ToolError::not_found(format!("Path does not exist: {}", args.path)))?;

    let regex = RegexBuilder::new(&args.pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ToolError::invalid_args(format!("Invalid regex pattern: {}", e)))?;

    let matcher = IgnoreMatcher::load(&root);

    let mut matches: Vec<Value> = Vec::new();
    let mut total_matches: u64 = 0;

    for entry in WalkDir::new(&root)
        .into_iter()
        .filter_entry(keep_entry)
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let ext = entry
            .path()
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if BINARY_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }

        let rel_path = entry
            .path()
            .strip_prefix(&root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        if matcher.is_ignored(&rel_path) {
            continue;
        }

        let Ok(bytes) = std::fs::read(entry.path()) else {
            continue;
        };
        let contents = String::from_utf8_lossy(&bytes);

        for (line_num, line) in contents.lines().enumerate() {
            if regex.is_match(line) {
                total_matches += 1;
                if matches.len() < args.max_results {
                    matches.push(json!({
                        "file": rel_path,
                        "line_num": line_num + 1,
                        "line": clip_chars(line.trim_end(), LINE_CLIP),
                    }));
                }
            }
        }
    }

    Ok(json!({
        "pattern": args.pattern,
        "search_path": root.display().to_string(),
        "matches": matches,
        "total_matches": total_matches,
        "truncated": total_matches > args.max_results as u64,
    }))
}
