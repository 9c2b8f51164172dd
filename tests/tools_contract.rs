//! Contract tests for the tool registry, driven through `dispatch` the same
//! way the agent loop calls it.

use serde_json::{json, Value};

use codequill::tools::{dispatch, ToolContext};

fn ctx() -> ToolContext {
    ToolContext::default()
}

async fn call(name: &str, args: Value) -> Value {
    dispatch(name, args, &ctx()).await
}

fn error_of(result: &Value) -> &str {
    result["error"].as_str().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// scan
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scan_counts_and_lists_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
    std::fs::write(dir.path().join("lib.rs"), "pub fn lib() {}").unwrap();
    std::fs::create_dir(dir.path().join("docs")).unwrap();
    std::fs::write(dir.path().join("docs/guide.md"), "# Guide").unwrap();

    let result = call("scan", json!({ "path": dir.path().to_string_lossy() })).await;

    assert_eq!(result["total_files"], 3);
    assert_eq!(result["by_extension"][".rs"], 2);
    assert_eq!(result["by_extension"][".md"], 1);
    assert_eq!(result["truncated"], false);
    let tree: Vec<&str> = result["tree"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(tree, vec!["docs/guide.md", "lib.rs", "main.rs"]);
}

#[tokio::test]
async fn scan_is_idempotent_on_unchanged_tree() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("one.rs"), "1").unwrap();
    std::fs::write(dir.path().join("two.py"), "2").unwrap();

    let args = json!({ "path": dir.path().to_string_lossy() });
    let first = call("scan", args.clone()).await;
    let second = call("scan", args).await;

    assert_eq!(first["total_files"], second["total_files"]);
    assert_eq!(first["by_extension"], second["by_extension"]);
    assert_eq!(first["tree"], second["tree"]);
}

#[tokio::test]
async fn scan_skips_build_dirs_hidden_files_and_ignored_patterns() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("kept.rs"), "ok").unwrap();
    std::fs::write(dir.path().join(".hidden"), "no").unwrap();
    std::fs::write(dir.path().join("debug.log"), "no").unwrap();
    std::fs::create_dir(dir.path().join("node_modules")).unwrap();
    std::fs::write(dir.path().join("node_modules/dep.js"), "no").unwrap();
    std::fs::write(dir.path().join(".cqignore"), "*.log\n").unwrap();

    let result = call("scan", json!({ "path": dir.path().to_string_lossy() })).await;

    assert_eq!(result["total_files"], 1);
    assert_eq!(result["tree"], json!(["kept.rs"]));
}

#[tokio::test]
async fn scan_missing_path_is_an_error() {
    let result = call("scan", json!({ "path": "/definitely/not/here" })).await;
    assert!(error_of(&result).contains("does not exist"));
}

// ---------------------------------------------------------------------------
// search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_reports_total_versus_returned_matches() {
    let dir = tempfile::tempdir().unwrap();
    let lines: Vec<String> = (0..10).map(|i| format!("let value_{} = TODO;", i)).collect();
    std::fs::write(dir.path().join("a.rs"), lines.join("\n")).unwrap();

    let result = call(
        "search",
        json!({ "pattern": "todo", "path": dir.path().to_string_lossy(), "max_results": 3 }),
    )
    .await;

    // Case-insensitive match, capped result list, full count reported.
    assert_eq!(result["total_matches"], 10);
    assert_eq!(result["matches"].as_array().unwrap().len(), 3);
    assert_eq!(result["truncated"], true);
    assert_eq!(result["matches"][0]["line_num"], 1);
    assert_eq!(result["matches"][0]["file"], "a.rs");
}

#[tokio::test]
async fn search_rejects_invalid_regex() {
    let dir = tempfile::tempdir().unwrap();
    let result = call(
        "search",
        json!({ "pattern": "(unclosed", "path": dir.path().to_string_lossy() }),
    )
    .await;
    assert!(error_of(&result).contains("Invalid regex"));
}

#[tokio::test]
async fn search_skips_binary_extensions() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("image.png"), "needle").unwrap();
    std::fs::write(dir.path().join("text.txt"), "needle").unwrap();

    let result = call(
        "search",
        json!({ "pattern": "needle", "path": dir.path().to_string_lossy() }),
    )
    .await;

    assert_eq!(result["total_matches"], 1);
    assert_eq!(result["matches"][0]["file"], "text.txt");
}

// ---------------------------------------------------------------------------
// read
// ---------------------------------------------------------------------------

#[tokio::test]
async fn read_defaults_start_at_line_one() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("f.txt");
    std::fs::write(&file, "first\nsecond\nthird").unwrap();

    // Only the path supplied; start/limit come from defaults.
    let result = call("read", json!({ "path": file.to_string_lossy() })).await;

    assert_eq!(result["total_lines"], 3);
    assert_eq!(result["start"], 1);
    assert_eq!(result["end"], 3);
    let content = result["content"].as_str().unwrap();
    assert!(content.contains("1  first"));
    assert!(content.contains("3  third"));
}

#[tokio::test]
async fn read_honors_start_and_limit() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("f.txt");
    let body: Vec<String> = (1..=10).map(|i| format!("line {}", i)).collect();
    std::fs::write(&file, body.join("\n")).unwrap();

    let result = call(
        "read",
        json!({ "path": file.to_string_lossy(), "start": 4, "limit": 2 }),
    )
    .await;

    assert_eq!(result["start"], 4);
    assert_eq!(result["end"], 5);
    let content = result["content"].as_str().unwrap();
    assert!(content.contains("line 4"));
    assert!(content.contains("line 5"));
    assert!(!content.contains("line 6"));
}

#[tokio::test]
async fn read_with_empty_args_reports_missing_file() {
    // Empty mapping exercises every argument default.
    let result = call("read", json!({})).await;
    assert!(error_of(&result).contains("does not exist"));
}

// ---------------------------------------------------------------------------
// write
// ---------------------------------------------------------------------------

#[tokio::test]
async fn write_refuses_to_clobber_without_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("keep.txt");
    std::fs::write(&file, "original").unwrap();

    let result = call(
        "write",
        json!({ "path": file.to_string_lossy(), "content": "new" }),
    )
    .await;

    assert!(error_of(&result).contains("already exists"));
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "original");
}

#[tokio::test]
async fn write_overwrites_when_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("keep.txt");
    std::fs::write(&file, "original").unwrap();

    let result = call(
        "write",
        json!({ "path": file.to_string_lossy(), "content": "new", "overwrite": true }),
    )
    .await;

    assert_eq!(result["success"], true);
    assert_eq!(result["bytes_written"], 3);
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "new");
}

#[tokio::test]
async fn write_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("deep/nested/out.txt");

    let result = call(
        "write",
        json!({ "path": file.to_string_lossy(), "content": "hello" }),
    )
    .await;

    assert_eq!(result["success"], true);
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "hello");
}

// ---------------------------------------------------------------------------
// edit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn edit_replaces_unique_occurrence() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("code.rs");
    std::fs::write(&file, "fn alpha() {}\nfn beta() {}\n").unwrap();

    let result = call(
        "edit",
        json!({
            "filepath": file.to_string_lossy(),
            "old_string": "fn beta() {}",
            "new_string": "fn gamma() {}"
        }),
    )
    .await;

    assert_eq!(result["success"], true);
    let contents = std::fs::read_to_string(&file).unwrap();
    assert!(contents.contains("fn gamma() {}"));
    assert!(!contents.contains("fn beta() {}"));
}

#[tokio::test]
async fn edit_rejects_ambiguous_target_and_leaves_file_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("code.rs");
    let original = "let x = 0;\nlet x = 0;\n";
    std::fs::write(&file, original).unwrap();

    let result = call(
        "edit",
        json!({
            "filepath": file.to_string_lossy(),
            "old_string": "let x = 0;",
            "new_string": "let y = 1;"
        }),
    )
    .await;

    assert!(error_of(&result).contains("appears 2 times"));
    assert_eq!(std::fs::read_to_string(&file).unwrap(), original);
}

#[tokio::test]
async fn edit_rejects_absent_target() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("code.rs");
    std::fs::write(&file, "fn main() {}").unwrap();

    let result = call(
        "edit",
        json!({
            "filepath": file.to_string_lossy(),
            "old_string": "does not occur",
            "new_string": "anything"
        }),
    )
    .await;

    assert!(error_of(&result).contains("not found"));
}

// ---------------------------------------------------------------------------
// delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_requires_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("precious.txt");
    std::fs::write(&file, "data").unwrap();

    let result = call("delete", json!({ "filepath": file.to_string_lossy() })).await;

    assert!(error_of(&result).contains("confirm=true"));
    assert!(file.exists());
}

#[tokio::test]
async fn delete_removes_directories_recursively_when_confirmed() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("olddir");
    std::fs::create_dir_all(target.join("sub")).unwrap();
    std::fs::write(target.join("sub/file.txt"), "x").unwrap();

    let result = call(
        "delete",
        json!({ "filepath": target.to_string_lossy(), "confirm": true }),
    )
    .await;

    assert_eq!(result["success"], true);
    assert_eq!(result["was_directory"], true);
    assert!(!target.exists());
}

// ---------------------------------------------------------------------------
// move / copy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn move_refuses_to_clobber_destination() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.txt");
    let dst = dir.path().join("dst.txt");
    std::fs::write(&src, "from").unwrap();
    std::fs::write(&dst, "to").unwrap();

    let result = call(
        "move",
        json!({ "src": src.to_string_lossy(), "dst": dst.to_string_lossy() }),
    )
    .await;

    assert!(error_of(&result).contains("already exists"));
    assert!(src.exists());
    assert_eq!(std::fs::read_to_string(&dst).unwrap(), "to");
}

#[tokio::test]
async fn move_renames_with_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.txt");
    let dst = dir.path().join("dst.txt");
    std::fs::write(&src, "from").unwrap();
    std::fs::write(&dst, "to").unwrap();

    let result = call(
        "move",
        json!({
            "src": src.to_string_lossy(),
            "dst": dst.to_string_lossy(),
            "overwrite": true
        }),
    )
    .await;

    assert_eq!(result["success"], true);
    assert!(!src.exists());
    assert_eq!(std::fs::read_to_string(&dst).unwrap(), "from");
}

#[tokio::test]
async fn copy_directory_recursively_reports_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("tree");
    std::fs::create_dir_all(src.join("sub")).unwrap();
    std::fs::write(src.join("a.txt"), "12345").unwrap();
    std::fs::write(src.join("sub/b.txt"), "678").unwrap();
    let dst = dir.path().join("tree_copy");

    let result = call(
        "copy",
        json!({ "src": src.to_string_lossy(), "dst": dst.to_string_lossy() }),
    )
    .await;

    assert_eq!(result["success"], true);
    assert_eq!(result["bytes_copied"], 8);
    assert_eq!(std::fs::read_to_string(dst.join("a.txt")).unwrap(), "12345");
    assert_eq!(std::fs::read_to_string(dst.join("sub/b.txt")).unwrap(), "678");
    assert!(src.exists());
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_captures_output_and_exit_code() {
    let result = call("run", json!({ "command": "echo hello && exit 0" })).await;

    assert_eq!(result["exit_code"], 0);
    assert!(result["stdout"].as_str().unwrap().contains("hello"));
}

#[tokio::test]
async fn run_reports_nonzero_exit_codes() {
    let result = call("run", json!({ "command": "exit 3" })).await;
    assert_eq!(result["exit_code"], 3);
}

#[tokio::test]
async fn run_timeout_yields_minus_one_with_message() {
    let result = call("run", json!({ "command": "sleep 5", "timeout": 1 })).await;

    assert_eq!(result["exit_code"], -1);
    assert!(result["stderr"].as_str().unwrap().contains("timed out after 1s"));
}

#[tokio::test]
async fn run_blocks_dangerous_commands() {
    let result = call("run", json!({ "command": "rm -rf /" })).await;
    assert!(error_of(&result).contains("Blocked dangerous command"));
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

#[tokio::test]
async fn apply_rejects_missing_target_files() {
    let dir = tempfile::tempdir().unwrap();
    let patch = dir.path().join("fix.diff");
    std::fs::write(
        &patch,
        "--- a/no_such_file.rs\n+++ b/no_such_file.rs\n@@ -1 +1 @@\n-a\n+b\n",
    )
    .unwrap();

    let result = call("apply", json!({ "patch_path": patch.to_string_lossy() })).await;
    assert!(error_of(&result).contains("do not exist"));
}

#[tokio::test]
async fn apply_rejects_patches_over_the_file_cap() {
    let dir = tempfile::tempdir().unwrap();
    let patch = dir.path().join("wide.diff");
    let mut body = String::new();
    for i in 0..3 {
        body.push_str(&format!(
            "--- a/file{i}.txt\n+++ b/file{i}.txt\n@@ -1 +1 @@\n-a\n+b\n"
        ));
    }
    std::fs::write(&patch, body).unwrap();

    let result = call(
        "apply",
        json!({ "patch_path": patch.to_string_lossy(), "max_files": 2 }),
    )
    .await;

    assert!(error_of(&result).contains("exceeds max_files_touched_per_run=2"));
}

#[tokio::test]
async fn apply_rejects_empty_patches() {
    let dir = tempfile::tempdir().unwrap();
    let patch = dir.path().join("empty.diff");
    std::fs::write(&patch, "not a patch at all\n").unwrap();

    let result = call("apply", json!({ "patch_path": patch.to_string_lossy() })).await;
    assert!(error_of(&result).contains("No valid files"));
}

// ---------------------------------------------------------------------------
// argument normalization at the dispatch boundary
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispatch_accepts_null_and_array_args() {
    // Both shapes collapse to an empty mapping; the tool then fails on its
    // own terms (missing file) instead of crashing on bad argument types.
    for args in [Value::Null, json!([]), json!([1, 2, 3])] {
        let result = call("read", args).await;
        assert!(error_of(&result).contains("does not exist"));
    }
}

#[tokio::test]
async fn dispatch_reports_unknown_tools() {
    let result = call("frobnicate", json!({})).await;
    assert_eq!(result["error"], "Unknown tool: frobnicate");
}
