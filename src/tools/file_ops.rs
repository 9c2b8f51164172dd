//! File operation tools: read, write, edit, delete, move, copy.
//!
//! Destructive operations carry their own guards: `write`, `move` and `copy`
//! refuse to clobber existing targets unless `overwrite` is set, `delete`
//! requires an explicit `confirm` flag, and `edit` rejects ambiguous
//! replacements. The agent loop performs no confirmation of its own.

use std::path::{Path, PathBuf};

use async_recursion::async_recursion;
use serde::Deserialize;
use serde_json::json;

use super::{ToolError, ToolResult};

fn default_start() -> usize {
    1
}

/// Absolute form of a path that may not exist yet.
fn absolutize(path: &str) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| PathBuf::from(path))
}

#[derive(Debug, Deserialize)]
pub struct ReadArgs {
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_start")]
    pub start: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Read a file and return a line-numbered content block.
pub async fn read(args: ReadArgs) -> ToolResult {
    let fpath = Path::new(&args.path)
        .canonicalize()
        .map_err(|_| ToolError::not_found(format!("File does not exist: {}", args.path)))?;

    if !fpath.is_file() {
        return Err(ToolError::invalid_args(format!(
            "Path is not a file: {}",
            args.path
        )));
    }

    let bytes = tokio::fs::read(&fpath)
        .await
        .map_err(|e| ToolError::io(format!("Cannot read file: {}", e)))?;
    let contents = String::from_utf8_lossy(&bytes);

    let lines: Vec<&str> = contents.lines().collect();
    let total_lines = lines.len();
    let start_idx = args.start.saturating_sub(1).min(total_lines);
    let end_idx = match args.limit {
        Some(limit) => (start_idx + limit).min(total_lines),
        None => total_lines,
    };

    let numbered: Vec<String> = lines[start_idx..end_idx]
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:6}  {}", start_idx + i + 1, line.trim_end()))
        .collect();

    Ok(json!({
        "file": fpath.display().to_string(),
        "content": numbered.join("\n"),
        "total_lines": total_lines,
        "start": start_idx + 1,
        "end": end_idx,
    }))
}

#[derive(Debug, Deserialize)]
pub struct WriteArgs {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub overwrite: bool,
}

/// Write content to a file, creating parent directories.
pub async fn write(args: WriteArgs) -> ToolResult {
    let fpath = absolutize(&args.path);

    if fpath.exists() && !args.overwrite {
        return Err(ToolError::conflict(format!(
            "File already exists: {}. Set overwrite=true to replace.",
            args.path
        )));
    }

    if let Some(parent) = fpath.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ToolError::io(format!("Cannot create directory: {}", e)))?;
    }

    tokio::fs::write(&fpath, &args.content)
        .await
        .map_err(|e| ToolError::io(format!("Cannot write file: {}", e)))?;

    Ok(json!({
        "success": true,
        "file": fpath.display().to_string(),
        "bytes_written": args.content.len(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct EditArgs {
    #[serde(default)]
    pub filepath: String,
    #[serde(default)]
    pub old_string: String,
    #[serde(default)]
    pub new_string: String,
}

/// Surgical edit: replace a unique occurrence of `old_string`.
///
/// Fails without touching the file when the target text is absent or
/// ambiguous.
pub async fn edit(args: EditArgs) -> ToolResult {
    let fpath = Path::new(&args.filepath)
        .canonicalize()
        .map_err(|_| ToolError::not_found(format!("File does not exist: {}", args.filepath)))?;

    if !fpath.is_file() {
        return Err(ToolError::invalid_args(format!(
            "Path is not a file: {}",
            args.filepath
        )));
    }

    let bytes = tokio::fs::read(&fpath)
        .await
        .map_err(|e| ToolError::io(format!("Cannot read file: {}", e)))?;
    let contents = String::from_utf8_lossy(&bytes).into_owned();

    let count = contents.matches(&args.old_string).count();
    if count == 0 {
        return Err(ToolError::failed(format!(
            "old_string not found in {}. Make sure it matches exactly (including whitespace).",
            args.filepath
        )));
    }
    if count > 1 {
        return Err(ToolError::failed(format!(
            "old_string appears {} times in {}. Must be unique for safe replacement. \
             Provide more context to make it unique.",
            count, args.filepath
        )));
    }

    let updated = contents.replacen(&args.old_string, &args.new_string, 1);
    tokio::fs::write(&fpath, updated)
        .await
        .map_err(|e| ToolError::io(format!("Cannot write file: {}", e)))?;

    Ok(json!({
        "success": true,
        "file": fpath.display().to_string(),
        "message": format!("Successfully replaced text in {}", args.filepath),
    }))
}

#[derive(Debug, Deserialize)]
pub struct DeleteArgs {
    #[serde(default)]
    pub filepath: String,
    #[serde(default)]
    pub confirm: bool,
}

/// Delete a file or directory. Requires `confirm=true`.
pub async fn delete(args: DeleteArgs) -> ToolResult {
    if !args.confirm {
        return Err(ToolError::blocked(format!(
            "Deletion requires confirm=true. Refusing to delete: {}",
            args.filepath
        )));
    }

    let fpath = Path::new(&args.filepath)
        .canonicalize()
        .map_err(|_| ToolError::not_found(format!("Path does not exist: {}", args.filepath)))?;

    let was_directory = fpath.is_dir();
    let result = if was_directory {
        tokio::fs::remove_dir_all(&fpath).await
    } else {
        tokio::fs::remove_file(&fpath).await
    };
    result.map_err(|e| ToolError::io(format!("Cannot delete: {}", e)))?;

    Ok(json!({
        "success": true,
        "deleted": fpath.display().to_string(),
        "was_directory": was_directory,
    }))
}

#[derive(Debug, Deserialize)]
pub struct TransferArgs {
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub dst: String,
    #[serde(default)]
    pub overwrite: bool,
}

/// Move or rename a file or directory.
pub async fn move_path(args: TransferArgs) -> ToolResult {
    let src = Path::new(&args.src)
        .canonicalize()
        .map_err(|_| ToolError::not_found(format!("Source does not exist: {}", args.src)))?;
    let dst = absolutize(&args.dst);

    if dst.exists() {
        if !args.overwrite {
            return Err(ToolError::conflict(format!(
                "Destination already exists: {}. Set overwrite=true to replace.",
                args.dst
            )));
        }
        remove_any(&dst).await?;
    }

    if let Some(parent) = dst.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ToolError::io(format!("Cannot create directory: {}", e)))?;
    }

    tokio::fs::rename(&src, &dst)
        .await
        .map_err(|e| ToolError::io(format!("Cannot move: {}", e)))?;

    Ok(json!({
        "success": true,
        "src": src.display().to_string(),
        "dst": dst.display().to_string(),
    }))
}

/// Copy a file or directory (recursively).
pub async fn copy(args: TransferArgs) -> ToolResult {
    let src = Path::new(&args.src)
        .canonicalize()
        .map_err(|_| ToolError::not_found(format!("Source does not exist: {}", args.src)))?;
    let dst = absolutize(&args.dst);

    if dst.exists() {
        if !args.overwrite {
            return Err(ToolError::conflict(format!(
                "Destination already exists: {}. Set overwrite=true to replace.",
                args.dst
            )));
        }
        remove_any(&dst).await?;
    }

    if let Some(parent) = dst.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ToolError::io(format!("Cannot create directory: {}", e)))?;
    }

    let bytes_copied = if src.is_dir() {
        copy_dir(&src, &dst).await?
    } else {
        tokio::fs::copy(&src, &dst)
            .await
            .map_err(|e| ToolError::io(format!("Cannot copy: {}", e)))?
    };

    Ok(json!({
        "success": true,
        "src": src.display().to_string(),
        "dst": dst.display().to_string(),
        "bytes_copied": bytes_copied,
    }))
}

async fn remove_any(path: &Path) -> Result<(), ToolError> {
    let result = if path.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };
    result.map_err(|e| ToolError::io(format!("Cannot replace destination: {}", e)))
}

#[async_recursion]
async fn copy_dir(src: &Path, dst: &Path) -> Result<u64, ToolError> {
    tokio::fs::create_dir_all(dst)
        .await
        .map_err(|e| ToolError::io(format!("Cannot create directory: {}", e)))?;

    let mut bytes: u64 = 0;
    let mut entries = tokio::fs::read_dir(src)
        .await
        .map_err(|e| ToolError::io(format!("Cannot read directory: {}", e)))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ToolError::io(format!("Cannot read directory: {}", e)))?
    {
        let target = dst.join(entry.file_name());
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| ToolError::io(format!("Cannot stat entry: {}", e)))?;

        if file_type.is_dir() {
            bytes += copy_dir(&entry.path(), &target).await?;
        } else {
            bytes += tokio::fs::copy(entry.path(), &target)
                .await
                .map_err(|e| ToolError::io(format!("Cannot copy: {}", e)))?;
        }
    }

    Ok(bytes)
}
