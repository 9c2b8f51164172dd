//! Interactive chat interface.
//!
//! Drives the same parse/dispatch primitives as the agent loop, turn by turn,
//! with a human supplying the task text. Slash commands manage the session;
//! everything else goes to the model.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::{json, Value};

use crate::agent::{
    decision_schema, parse_decision, render_prompt, system_prompt, Decision, HistoryRecord,
};
use crate::config::Config;
use crate::llm::{CompletionClient, CompletionRequest, AGENTIC_MODELS};
use crate::tools::{dispatch, ToolContext};
use crate::undo::UndoManager;

/// Tool calls allowed within a single user turn.
const MAX_TOOL_CALLS_PER_TURN: usize = 10;

/// Tools that mutate the tree and trigger an auto-snapshot.
const DESTRUCTIVE_TOOLS: &[&str] = &["write", "edit", "delete", "move", "apply"];

const NUDGE: &str = "Invalid response format. Please respond with valid JSON matching the schema: {\"action\": \"done\", \"message\": \"your message here\"}";

const HELP_TEXT: &str = r#"
Available commands:
  /help          Show this help message
  /save          Save conversation (auto-generates filename)
  /save <name>   Save conversation with specific filename
  /load          List available saved conversations
  /load <name>   Load a saved conversation
  /paste         Enter multi-line input mode (paste text, then type EOF on its own line)
  /clear         Clear conversation history and start fresh
  /model         Show current model
  /model <name>  Switch to a different model
  /history       Show conversation history length
  /undo          Undo last file change (pops git stash)
  /snapshots     List available undo snapshots
  /quit or /q    Exit the chat

Tips:
- Ask questions about code, request file searches, or give tasks
- The AI can use tools: scan, search, read, write, edit, apply, run, delete, move, copy
- Tool calls happen automatically when needed
- Automatic snapshots are created before destructive operations (write, edit, delete)
- Use /undo to revert changes, /snapshots to see what's available
- Use /paste to paste multi-line error messages or code blocks
"#;

/// Parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Clear,
    Help,
    Paste,
    History,
    ShowModel,
    SwitchModel(String),
    Undo,
    Snapshots,
    Save(Option<String>),
    Load(Option<String>),
    Unknown(String),
}

/// Route a slash command to an action.
pub fn parse_command(input: &str) -> Command {
    let lower = input.trim().to_lowercase();

    match lower.as_str() {
        "/quit" | "/q" | "/exit" => return Command::Quit,
        "/clear" => return Command::Clear,
        "/help" => return Command::Help,
        "/paste" => return Command::Paste,
        "/history" => return Command::History,
        "/model" => return Command::ShowModel,
        "/undo" => return Command::Undo,
        "/snapshots" => return Command::Snapshots,
        "/save" => return Command::Save(None),
        "/load" => return Command::Load(None),
        _ => {}
    }

    // Prefix commands match case-insensitively; the argument keeps its case.
    let trimmed = input.trim();
    if lower.starts_with("/model ") {
        Command::SwitchModel(trimmed[7..].trim().to_string())
    } else if lower.starts_with("/save ") {
        Command::Save(Some(trimmed[6..].trim().to_string()))
    } else if lower.starts_with("/load ") {
        Command::Load(Some(trimmed[6..].trim().to_string()))
    } else {
        Command::Unknown(trimmed.to_string())
    }
}

/// One interactive chat session.
pub struct ChatSession {
    config: Config,
    client: Arc<dyn CompletionClient>,
    undo: UndoManager,
    model: String,
    history: Vec<HistoryRecord>,
    tool_calls_this_session: usize,
}

impl ChatSession {
    pub fn new(config: Config, client: Arc<dyn CompletionClient>, model: Option<&str>) -> Self {
        let model = model.unwrap_or(&config.default_model).to_string();
        let undo = UndoManager::new(".");
        Self {
            config,
            client,
            undo,
            model,
            history: Vec::new(),
            tool_calls_this_session: 0,
        }
    }

    /// Run the interactive loop until the user quits.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        println!("codequill chat - agentic code runner");
        println!("  Model: {}", self.model);
        println!("  Type /help for commands\n");

        let mut editor = DefaultEditor::new()?;

        loop {
            let line = match editor.readline("\x1b[1;32myou>\x1b[0m ") {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    println!("\nGoodbye!");
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            let input = line.trim().to_string();
            if input.is_empty() {
                continue;
            }
            let _ = editor.add_history_entry(&input);

            let user_text = if input.starts_with('/') {
                match self.handle_command(&input, &mut editor) {
                    CommandOutcome::Quit => {
                        println!("Goodbye!");
                        break;
                    }
                    CommandOutcome::Handled => continue,
                    CommandOutcome::Submit(text) => text,
                }
            } else {
                input
            };

            self.history.push(HistoryRecord::user(&user_text));
            self.process_turn().await;
        }

        Ok(())
    }

    /// Run the model until it declares done or the turn budget runs out.
    async fn process_turn(&mut self) {
        let tool_ctx = ToolContext::from_config(&self.config);
        let mut tool_calls_this_turn = 0;

        while tool_calls_this_turn < MAX_TOOL_CALLS_PER_TURN {
            print!("\n\x1b[1;31mcodequill>\x1b[0m ");
            let _ = std::io::Write::flush(&mut std::io::stdout());

            let request = CompletionRequest::new(render_prompt(&self.history), &self.model)
                .with_system_prompt(system_prompt(None))
                .with_schema(decision_schema())
                .with_timeout(self.config.api_timeout_secs);

            let response = self.client.complete(&request).await;
            if !response.success {
                println!(
                    "\n[Error: {}]",
                    response.error.as_deref().unwrap_or("Unknown error")
                );
                break;
            }

            let raw = response.content;
            let text = match &raw {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };

            let Some(decision) = parse_decision(&raw) else {
                println!("\n[Invalid response format - asking AI to reformat...]");
                self.history.push(HistoryRecord::assistant(&text));
                self.history.push(HistoryRecord::system(NUDGE));
                continue;
            };

            match decision {
                Decision::Done { message, .. } => {
                    println!("{}", message);
                    self.history.push(HistoryRecord::assistant(&text));
                    break;
                }
                Decision::ToolCall {
                    tool_name,
                    tool_args,
                    message,
                    ..
                } => {
                    if !message.is_empty() {
                        println!("{}", message);
                    }
                    print!("\n\x1b[1;33m[tool: {}]\x1b[0m ", tool_name);
                    let _ = std::io::Write::flush(&mut std::io::stdout());

                    if self.config.auto_snapshot && DESTRUCTIVE_TOOLS.contains(&tool_name.as_str())
                    {
                        self.undo.snapshot(&format!("before {}", tool_name));
                    }

                    let args = Value::Object(tool_args);
                    let result = dispatch(&tool_name, args, &tool_ctx).await;
                    tool_calls_this_turn += 1;
                    self.tool_calls_this_session += 1;

                    match result.get("error").and_then(Value::as_str) {
                        Some(error) => println!("\x1b[1;31m{}\x1b[0m", error),
                        None => {
                            let encoded = result.to_string();
                            if encoded.len() > 100 {
                                println!("OK ({} chars)", encoded.len());
                            } else {
                                println!("OK");
                            }
                        }
                    }

                    self.history.push(HistoryRecord::assistant(&text));
                    self.history
                        .push(HistoryRecord::tool_result(&tool_name, result.to_string()));

                    if self.tool_calls_this_session >= self.config.max_tool_calls_per_session {
                        println!("\n[Max tool calls reached for session. Use /clear to reset.]");
                        break;
                    }
                }
            }
        }
    }

    fn handle_command(&mut self, input: &str, editor: &mut DefaultEditor) -> CommandOutcome {
        match parse_command(input) {
            Command::Quit => CommandOutcome::Quit,
            Command::Clear => {
                self.history.clear();
                self.tool_calls_this_session = 0;
                println!("Conversation cleared.");
                CommandOutcome::Handled
            }
            Command::Help => {
                println!("{}", HELP_TEXT);
                CommandOutcome::Handled
            }
            Command::History => {
                println!("Conversation has {} messages.", self.history.len());
                CommandOutcome::Handled
            }
            Command::ShowModel => {
                println!(
                    "Current model: {}\nAvailable: {}",
                    self.model,
                    AGENTIC_MODELS.join(", ")
                );
                CommandOutcome::Handled
            }
            Command::SwitchModel(name) => {
                if AGENTIC_MODELS.contains(&name.as_str()) {
                    self.model = name;
                    println!("Switched to model: {}", self.model);
                } else {
                    println!("Unknown model: {}", name);
                    println!("Available: {}", AGENTIC_MODELS.join(", "));
                }
                CommandOutcome::Handled
            }
            Command::Undo => {
                let (_, message) = self.undo.undo();
                println!("{}", message);
                CommandOutcome::Handled
            }
            Command::Snapshots => {
                let snapshots = self.undo.list_snapshots();
                if snapshots.is_empty() {
                    println!("No snapshots available.");
                } else {
                    println!("Available snapshots:");
                    for snap in snapshots {
                        println!("  {}: {}", snap.reference, snap.message);
                    }
                }
                CommandOutcome::Handled
            }
            Command::Save(name) => {
                let filename = match name {
                    Some(name) if name.ends_with(".json") => name,
                    Some(name) => format!("{}.json", name),
                    None => format!("chat_{}.json", Local::now().format("%Y%m%d_%H%M%S")),
                };
                match self.save_conversation(&filename) {
                    Ok(()) => println!("Conversation saved to {}", filename),
                    Err(e) => println!("Error saving conversation: {}", e),
                }
                CommandOutcome::Handled
            }
            Command::Load(None) => {
                let conversations = self.list_conversations();
                if conversations.is_empty() {
                    println!("No saved conversations found.");
                } else {
                    println!("Available conversations:");
                    for name in conversations {
                        println!("  {}", name);
                    }
                    println!("Use /load <filename> to load one.");
                }
                CommandOutcome::Handled
            }
            Command::Load(Some(name)) => {
                let filename = if name.ends_with(".json") {
                    name
                } else {
                    format!("{}.json", name)
                };
                match self.load_conversation(&filename) {
                    Ok(messages) => {
                        println!("Loaded {} messages from {}", messages.len(), filename);
                        self.history = messages;
                    }
                    Err(e) => println!("Failed to load {}: {}", filename, e),
                }
                CommandOutcome::Handled
            }
            Command::Paste => {
                println!("Paste mode: Enter text, then type EOF on its own line to submit.");
                println!("{}", "-".repeat(40));
                let mut lines = Vec::new();
                loop {
                    match editor.readline("") {
                        Ok(line) => {
                            let marker = line.trim().to_uppercase();
                            if marker == "EOF" || marker == "---" {
                                break;
                            }
                            lines.push(line);
                        }
                        Err(_) => break,
                    }
                }
                if lines.is_empty() {
                    println!("No input received.");
                    CommandOutcome::Handled
                } else {
                    CommandOutcome::Submit(lines.join("\n"))
                }
            }
            Command::Unknown(cmd) => {
                println!("Unknown command: {}\nType /help for available commands.", cmd);
                CommandOutcome::Handled
            }
        }
    }

    fn conversation_path(&self, filename: &str) -> PathBuf {
        self.config.conversation_dir.join(filename)
    }

    fn save_conversation(&self, filename: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.config.conversation_dir)?;
        let payload = json!({
            "timestamp": Local::now().to_rfc3339(),
            "messages": self.history,
        });
        std::fs::write(
            self.conversation_path(filename),
            serde_json::to_string_pretty(&payload)?,
        )?;
        Ok(())
    }

    fn load_conversation(&self, filename: &str) -> anyhow::Result<Vec<HistoryRecord>> {
        let contents = std::fs::read_to_string(self.conversation_path(filename))?;
        let payload: Value = serde_json::from_str(&contents)?;
        let messages = payload
            .get("messages")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No messages in {}", filename))?;
        Ok(serde_json::from_value(messages)?)
    }

    /// Saved conversations, newest first.
    fn list_conversations(&self) -> Vec<String> {
        let Ok(dir) = std::fs::read_dir(&self.config.conversation_dir) else {
            return Vec::new();
        };

        let mut files: Vec<(std::time::SystemTime, String)> = dir
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "json").unwrap_or(false))
            .filter_map(|e| {
                let modified = e.metadata().ok()?.modified().ok()?;
                Some((modified, e.file_name().to_string_lossy().into_owned()))
            })
            .collect();
        files.sort_by(|a, b| b.0.cmp(&a.0));
        files.into_iter().map(|(_, name)| name).collect()
    }
}

enum CommandOutcome {
    Quit,
    Handled,
    Submit(String),
}
