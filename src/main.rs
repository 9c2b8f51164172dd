//! codequill - CLI entry point.

use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use codequill::agent::AgentRunner;
use codequill::analytics::LogAnalyzer;
use codequill::audit::AuditLogger;
use codequill::chat::ChatSession;
use codequill::config::Config;
use codequill::llm::GatewayClient;
use codequill::tools::{self, ToolContext};

#[derive(Parser)]
#[command(name = "codequill", version, about = "Agentic code runner CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan repository and print summary
    Scan {
        /// Root path to scan
        #[arg(default_value = ".")]
        path: String,
    },
    /// Search for pattern in files
    Search {
        /// Regex pattern to search
        pattern: String,
        /// Path to search in
        #[arg(default_value = ".")]
        path: String,
        /// Max results
        #[arg(long, default_value_t = 50)]
        max: usize,
    },
    /// Read file contents
    Read {
        /// File path to read
        path: String,
        /// Start line (1-indexed)
        #[arg(long, default_value_t = 1)]
        start: usize,
        /// Max lines to read
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Apply unified diff patch
    Apply {
        /// Path to patch file (.diff)
        patch: String,
        /// Max files allowed in patch (default from config)
        #[arg(long)]
        max_files: Option<usize>,
    },
    /// Run shell command
    Run {
        /// Command to execute
        command: String,
        /// Timeout in seconds
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },
    /// Run agentic loop for a task
    Agent {
        /// Task description for the agent
        task: String,
        /// Model to use (default from config)
        #[arg(long)]
        model: Option<String>,
        /// Max loop iterations
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Minimal output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Interactive chat with tools
    Chat {
        /// Model to use (default from config)
        #[arg(long)]
        model: Option<String>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Analyze usage logs and statistics
    Analytics {
        /// Number of days to analyze
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Validate configuration file
    Validate {
        /// Path to config file
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codequill=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(None)?;
    let audit = AuditLogger::new(&config.log_dir);

    let exit_code = dispatch_command(cli.command, config, audit).await;
    std::process::exit(exit_code);
}

async fn dispatch_command(command: Command, config: Config, audit: AuditLogger) -> i32 {
    match command {
        Command::Scan { path } => {
            run_tool_command("scan", json!({ "path": path }), &config, &audit).await
        }
        Command::Search { pattern, path, max } => {
            run_tool_command(
                "search",
                json!({ "pattern": pattern, "path": path, "max_results": max }),
                &config,
                &audit,
            )
            .await
        }
        Command::Read { path, start, limit } => {
            let args = json!({ "path": path, "start": start, "limit": limit });
            let start_time = Instant::now();
            let ctx = ToolContext::from_config(&config);
            let result = tools::dispatch("read", args.clone(), &ctx).await;
            let success = result.get("error").is_none();
            audit.log(
                "read",
                args,
                result.clone(),
                success,
                Some(start_time.elapsed().as_secs_f64() * 1000.0),
            );

            if !success {
                println!("{}", pretty(&result));
                return 1;
            }
            // Print content directly for readability, metadata as JSON header.
            let mut meta = result.clone();
            if let Some(map) = meta.as_object_mut() {
                map.remove("content");
            }
            println!("# {}", meta);
            println!("{}", result["content"].as_str().unwrap_or_default());
            0
        }
        Command::Apply { patch, max_files } => {
            run_tool_command(
                "apply",
                json!({ "patch_path": patch, "max_files": max_files }),
                &config,
                &audit,
            )
            .await
        }
        Command::Run { command, timeout } => {
            let args = json!({ "command": command, "timeout": timeout });
            let start_time = Instant::now();
            let ctx = ToolContext::from_config(&config);
            let result = tools::dispatch("run", args.clone(), &ctx).await;
            let exit_code = result.get("exit_code").and_then(Value::as_i64).unwrap_or(1);
            audit.log(
                "run",
                args,
                result.clone(),
                exit_code == 0,
                Some(start_time.elapsed().as_secs_f64() * 1000.0),
            );
            println!("{}", pretty(&result));
            exit_code as i32
        }
        Command::Agent {
            task,
            model,
            max_iterations,
            quiet,
        } => {
            let client = Arc::new(GatewayClient::new(audit.clone()));
            let runner = AgentRunner::new(config, client, audit);
            let result = runner
                .run(&task, model.as_deref(), max_iterations, !quiet)
                .await;

            if !quiet {
                println!("\n{}", "=".repeat(50));
                println!("FINAL RESULT:");
                println!("{}", "=".repeat(50));
            }
            println!("{}", result.result);
            if !quiet {
                println!(
                    "\n[{} iterations, {} tool calls]",
                    result.iterations,
                    result.tool_calls.len()
                );
            }

            if result.success {
                0
            } else {
                1
            }
        }
        Command::Chat { model } => {
            let client = Arc::new(GatewayClient::new(audit.clone()));
            let mut session = ChatSession::new(config, client, model.as_deref());
            match session.run().await {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("Chat failed: {}", e);
                    1
                }
            }
        }
        Command::Config { command } => match command {
            ConfigCommand::Validate { config: path } => {
                let loaded = match Config::load(path.as_deref().map(std::path::Path::new)) {
                    Ok(c) => c,
                    Err(e) => {
                        println!("Configuration has errors:");
                        println!("  - {}", e);
                        return 1;
                    }
                };
                let errors = loaded.validate();
                if errors.is_empty() {
                    println!("Configuration is valid");
                    0
                } else {
                    println!("Configuration has errors:");
                    for error in errors {
                        println!("  - {}", error);
                    }
                    1
                }
            }
        },
        Command::Analytics { days } => {
            let analyzer = LogAnalyzer::new(&config.log_dir);
            println!("{}", analyzer.report(days));
            0
        }
    }
}

/// Run one tool directly, audit-log it, and print the JSON result.
async fn run_tool_command(name: &str, args: Value, config: &Config, audit: &AuditLogger) -> i32 {
    let start = Instant::now();
    let ctx = ToolContext::from_config(config);
    let result = tools::dispatch(name, args.clone(), &ctx).await;
    let success = result.get("error").is_none();
    audit.log(
        name,
        args,
        result.clone(),
        success,
        Some(start.elapsed().as_secs_f64() * 1000.0),
    );

    println!("{}", pretty(&result));
    if success {
        0
    } else {
        1
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
