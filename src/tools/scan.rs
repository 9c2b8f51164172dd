//! Repository scan tool and shared traversal filters.
//!
//! `scan` walks a directory tree and summarizes it: file/dir counts, an
//! extension histogram, and a capped file listing. Build and VCS directories
//! are always skipped; user patterns come from a `.cqignore` file at the
//! scan root.

use std::collections::BTreeMap;
use std::path::Path;

use glob::Pattern;
use serde::Deserialize;
use serde_json::json;
use walkdir::{DirEntry, WalkDir};

use super::{ToolError, ToolResult};

/// Ignore file read from the scan/search root.
pub const IGNORE_FILENAME: &str = ".cqignore";

/// Maximum number of paths returned in the scan tree.
const TREE_LIMIT: usize = 200;

/// Directories never descended into.
pub(super) const SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    "target",
    ".next",
    ".nuxt",
    "vendor",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    "coverage",
    ".cache",
];

/// Whether a walk entry should be visited at all.
///
/// Skips hidden names everywhere and the fixed build/VCS directory set.
pub(super) fn keep_entry(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return false;
    }
    if entry.file_type().is_dir() && SKIP_DIRS.contains(&name.as_ref()) {
        return false;
    }
    true
}

enum IgnoreRule {
    /// Pattern ending in `/`: matches the directory itself and anything under it.
    Dir {
        raw: String,
        exact: Pattern,
        nested: Pattern,
    },
    /// Plain pattern: matched against the relative path and the basename.
    File(Pattern),
}

/// Compiled `.cqignore` patterns.
pub(super) struct IgnoreMatcher {
    rules: Vec<IgnoreRule>,
}

impl IgnoreMatcher {
    /// Load patterns from `{root}/.cqignore`. Missing file means no rules;
    /// unparseable patterns are skipped.
    pub(super) fn load(root: &Path) -> Self {
        let mut rules = Vec::new();

        let Ok(contents) = std::fs::read_to_string(root.join(IGNORE_FILENAME)) else {
            return Self { rules };
        };

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(dir) = line.strip_suffix('/') {
                let exact = Pattern::new(dir);
                let nested = Pattern::new(&format!("*/{}", dir));
                match (exact, nested) {
                    (Ok(exact), Ok(nested)) => rules.push(IgnoreRule::Dir {
                        raw: dir.to_string(),
                        exact,
                        nested,
                    }),
                    _ => tracing::debug!("Skipping invalid ignore pattern: {}", line),
                }
            } else {
                match Pattern::new(line) {
                    Ok(pattern) => rules.push(IgnoreRule::File(pattern)),
                    Err(_) => tracing::debug!("Skipping invalid ignore pattern: {}", line),
                }
            }
        }

        Self { rules }
    }

    /// Check a root-relative path (with `/` separators) against the rules.
    pub(super) fn is_ignored(&self, rel_path: &str) -> bool {
        let basename = rel_path.rsplit('/').next().unwrap_or(rel_path);

        self.rules.iter().any(|rule| match rule {
            IgnoreRule::Dir { raw, exact, nested } => {
                exact.matches(rel_path)
                    || nested.matches(rel_path)
                    || rel_path.starts_with(&format!("{}/", raw))
                    || rel_path.contains(&format!("/{}/", raw))
            }
            IgnoreRule::File(pattern) => pattern.matches(rel_path) || pattern.matches(basename),
        })
    }
}

fn default_path() -> String {
    ".".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ScanArgs {
    #[serde(default = "default_path")]
    pub path: String,
}

/// Scan a directory tree and return a summary map.
pub fn scan(args: ScanArgs) -> ToolResult {
    let root = Path::new(&args.path)
        .canonicalize()
        .map_err(|_| ToolError::not_found(format!("Path does not exist: {}", args.path)))?;

    let matcher = IgnoreMatcher::load(&root);

    let mut total_files: u64 = 0;
    let mut total_dirs: u64 = 0;
    let mut by_extension: BTreeMap<String, u64> = BTreeMap::new();
    let mut tree: Vec<String> = Vec::new();

    for entry in WalkDir::new(&root)
        .into_iter()
        .filter_entry(keep_entry)
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_dir() {
            total_dirs += 1;
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

        total_files += 1;
        let ext = entry
            .path()
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| "(no ext)".to_string());
        *by_extension.entry(ext).or_insert(0) += 1;

        if tree.len() < TREE_LIMIT {
            tree.push(rel_path);
        }
    }

    tree.sort();

    Ok(json!({
        "root": root.display().to_string(),
        "total_files": total_files,
        "total_dirs": total_dirs,
        "by_extension": by_extension,
        "tree": tree,
        "truncated": total_files > TREE_LIMIT as u64,
    }))
}
