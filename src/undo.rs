//! Undo support backed by git stash.
//!
//! Snapshots are ordinary stash entries; undo pops the most recent one. All
//! operations degrade softly: a machine without git simply has no undo.

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Local;

/// One stash entry usable for undo.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Stash reference, e.g. `stash@{0}`.
    pub reference: String,
    pub message: String,
}

/// Manages repo snapshots via git stash.
///
/// Constructed explicitly and passed where needed; lifecycle belongs to the
/// process entry point.
#[derive(Debug, Clone)]
pub struct UndoManager {
    repo_path: PathBuf,
}

impl UndoManager {
    /// Create a manager for `repo_path`, initializing a git repo there if
    /// none exists. Initialization failures are swallowed; undo is then
    /// simply unavailable.
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        let manager = Self {
            repo_path: repo_path.into(),
        };
        manager.ensure_repo();
        manager
    }

    fn git(&self, args: &[&str]) -> std::io::Result<std::process::Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
    }

    fn ensure_repo(&self) {
        if self.repo_path.join(".git").exists() {
            return;
        }
        let initialized = self.git(&["init"]).map(|o| o.status.success()).unwrap_or(false);
        if initialized {
            let _ = self.git(&["add", "."]);
            let _ = self.git(&["commit", "-m", "Initial commit (codequill)", "--allow-empty"]);
        }
    }

    /// Stash the current working tree state. Returns whether a snapshot was
    /// actually created (a clean tree produces none).
    pub fn snapshot(&self, message: &str) -> bool {
        let staged = self
            .git(&["add", "-A"])
            .map(|o| o.status.success())
            .unwrap_or(false);
        if !staged {
            return false;
        }

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let full_message = format!("{} ({})", message, timestamp);
        self.git(&["stash", "push", "-m", &full_message])
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Pop the most recent snapshot. Returns (success, user-facing message).
    pub fn undo(&self) -> (bool, String) {
        match self.git(&["stash", "pop"]) {
            Ok(output) if output.status.success() => (true, "Undo successful".to_string()),
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let reason = if stderr.trim().is_empty() {
                    "No snapshots available".to_string()
                } else {
                    stderr.trim().to_string()
                };
                (false, format!("Undo failed: {}", reason))
            }
            Err(_) => (false, "Git not available".to_string()),
        }
    }

    /// List available snapshots, most recent first.
    pub fn list_snapshots(&self) -> Vec<Snapshot> {
        let Ok(output) = self.git(&["stash", "list"]) else {
            return Vec::new();
        };
        if !output.status.success() {
            return Vec::new();
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(parse_stash_line)
            .collect()
    }

    /// Drop every snapshot.
    pub fn clear_snapshots(&self) -> bool {
        self.git(&["stash", "clear"])
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}

/// Parse one `git stash list` line: `stash@{0}: On main: message`.
fn parse_stash_line(line: &str) -> Option<Snapshot> {
    let mut parts = line.splitn(3, ": ");
    let reference = parts.next()?.to_string();
    let _branch = parts.next()?;
    let message = parts.next()?.to_string();
    Some(Snapshot { reference, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stash_list_lines() {
        let snap = parse_stash_line("stash@{0}: On main: before write (2024-05-01 10:00:00)")
            .expect("line should parse");
        assert_eq!(snap.reference, "stash@{0}");
        assert_eq!(snap.message, "before write (2024-05-01 10:00:00)");
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_stash_line("").is_none());
        assert!(parse_stash_line("stash@{0}").is_none());
    }

    #[test]
    fn snapshot_and_undo_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = UndoManager::new(dir.path());

        // Skip silently when git is unavailable in the test environment.
        if !dir.path().join(".git").exists() {
            return;
        }
        let configured = Command::new("git")
            .args(["config", "user.email", "test@example.com"])
            .current_dir(dir.path())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
            && Command::new("git")
                .args(["config", "user.name", "Test"])
                .current_dir(dir.path())
                .status()
                .map(|s| s.success())
                .unwrap_or(false);
        if !configured {
            return;
        }
        // Re-create the initial commit now that an identity exists.
        let _ = Command::new("git")
            .args(["commit", "-m", "init", "--allow-empty"])
            .current_dir(dir.path())
            .status();

        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "v1").unwrap();
        assert!(manager.snapshot("before change"));
        assert!(!file.exists() || std::fs::read_to_string(&file).unwrap() != "v1");

        let (ok, msg) = manager.undo();
        assert!(ok, "undo failed: {}", msg);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "v1");
    }
}
