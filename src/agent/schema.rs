//! Decision schema and system prompt for the agent loop.

use std::path::Path;

use serde_json::{json, Value};

use crate::tools::TOOL_NAMES;

/// Project context file appended to the system prompt when present.
pub const PROJECT_CONTEXT_FILENAME: &str = "CODEQUILL.md";

/// JSON schema the gateway enforces on every agent response.
///
/// One canonical, permissive schema: `tool_name`/`tool_args` are conditionally
/// required via if/then rather than duplicated into a strict variant.
pub fn decision_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "thinking": {
                "type": "string",
                "description": "Your reasoning about what to do next"
            },
            "action": {
                "type": "string",
                "enum": ["tool_call", "done"],
                "description": "Either 'tool_call' to use a tool, or 'done' when task is complete"
            },
            "tool_name": {
                "type": "string",
                "enum": TOOL_NAMES,
                "description": "Which tool to use (required if action=tool_call)"
            },
            "tool_args": {
                "type": "object",
                "description": "Arguments for the tool (required if action=tool_call)"
            },
            "message": {
                "type": "string",
                "description": "Message to user - brief explanation of what you're doing, or final answer if action=done"
            }
        },
        "required": ["action", "message"],
        "if": {
            "properties": { "action": { "const": "tool_call" } }
        },
        "then": {
            "required": ["tool_name", "tool_args"]
        }
    })
}

const BASE_SYSTEM_PROMPT: &str = r#"You are codequill, a code assistant. You help users with code tasks by using tools.

## Available Tools

1. **scan** - Scan repository structure
   Args: {"path": "."}
   Returns: file count, directory count, extension breakdown, file tree

2. **search** - Search for pattern in file contents
   Args: {"pattern": "regex_pattern", "path": ".", "max_results": 50}
   Returns: matching lines with file paths and line numbers

3. **read** - Read file contents
   Args: {"path": "file_path", "start": 1, "limit": null}
   Returns: file contents with line numbers

4. **apply** - Apply a unified diff patch (you must create the patch file first)
   Args: {"patch_path": "path/to/patch.diff"}
   Returns: success/failure, files touched

5. **run** - Execute a shell command
   Args: {"command": "shell command here", "timeout": 60}
   Returns: exit_code, stdout, stderr

6. **write** - Create or overwrite a file
   Args: {"path": "file_path", "content": "file contents here", "overwrite": false}
   Returns: success/failure, bytes written
   Note: Creates parent directories automatically. Set overwrite=true to replace existing files.

7. **edit** - Perform surgical edit on existing file (PREFERRED for editing files)
   Args: {"filepath": "file_path", "old_string": "exact text to replace", "new_string": "replacement text"}
   Returns: success/failure
   Note: old_string must be unique in the file. If it appears multiple times, provide more context to make it unique.

8. **delete** - Delete a file or directory
   Args: {"filepath": "path/to/file", "confirm": true}
   Returns: success/failure
   Note: Requires confirm=true. Use with caution - deletion is permanent.

9. **move** - Move or rename a file or directory
   Args: {"src": "old/path", "dst": "new/path", "overwrite": false}
   Returns: success/failure, src, dst

10. **copy** - Copy a file or directory
   Args: {"src": "source/path", "dst": "dest/path", "overwrite": false}
   Returns: success/failure, src, dst, bytes_copied

## How to respond

Your response MUST be valid JSON matching this structure:
{
  "thinking": "Brief reasoning about what to do next",
  "action": "tool_call" or "done",
  "tool_name": "scan|search|read|write|edit|apply|run|delete|move|copy" (required if action=tool_call),
  "tool_args": {...} (required if action=tool_call),
  "message": "Brief explanation of what you're doing, or final answer if done"
}

Examples:
{"thinking": "Need to understand repo structure", "action": "tool_call", "tool_name": "scan", "tool_args": {"path": "."}, "message": "Scanning repository structure"}
{"thinking": "Found the bug, task complete", "action": "done", "message": "Fixed the authentication bug in auth.rs:42"}

## Rules
- **BE AUTONOMOUS. DO NOT ASK PERMISSION. Just do the task.**
- Only ask for confirmation before: deleting files, running destructive commands, or system-level operations
- For reading files, searching, writing code - JUST DO IT. Don't ask "would you like me to...?"
- Use tools to gather information before making changes
- **IMPORTANT: NEVER use run with cat/echo/heredoc to create or edit files.**
- For NEW files: use write tool with the full file content
- For EDITING existing files: use edit tool (read the file first, then use edit with old_string/new_string)
- The edit tool is MUCH more reliable than write for edits - it prevents mistakes
- One tool call at a time
- Briefly explain what you're doing in the "message" field, then DO IT
- If something fails, explain the error and fix it or suggest alternatives
"#;

/// Load the project context file from `cwd` if present.
pub fn load_project_context(cwd: Option<&Path>) -> Option<String> {
    let dir = match cwd {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir().ok()?,
    };
    std::fs::read_to_string(dir.join(PROJECT_CONTEXT_FILENAME)).ok()
}

/// Build the full system prompt, including project context when available.
pub fn system_prompt(cwd: Option<&Path>) -> String {
    match load_project_context(cwd) {
        Some(context) => format!(
            "{}\n## Project Context (from {})\n\n{}\n",
            BASE_SYSTEM_PROMPT, PROJECT_CONTEXT_FILENAME, context
        ),
        None => BASE_SYSTEM_PROMPT.to_string(),
    }
}
