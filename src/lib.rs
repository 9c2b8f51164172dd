//! # codequill
//!
//! Agentic code runner: a CLI that hands a task to a remote language model
//! and executes the structured tool calls it decides on, one per iteration,
//! until the model declares completion or a safety limit trips.
//!
//! ## Architecture
//!
//! ```text
//!        ┌──────────────────────────────┐
//!        │         AgentRunner          │
//!        │  history · budgets · states  │
//!        └──────┬───────────────┬───────┘
//!               │               │
//!               ▼               ▼
//!      ┌──────────────────┐ ┌────────────┐
//!      │ CompletionClient │ │ Tool       │
//!      │ (gateway)        │ │ dispatch   │
//!      └──────────────────┘ └────────────┘
//! ```
//!
//! ## Loop contract
//! 1. Serialize the full conversation history into one prompt
//! 2. Ask the gateway for a schema-constrained decision
//! 3. Parse and normalize it; nudge the model on malformed output
//! 4. Dispatch the requested tool and append the result to history
//! 5. Stop on `done`, a gateway failure, or an exhausted budget
//!
//! ## Modules
//! - `agent`: loop controller, decision parsing, history, schema
//! - `tools`: the ten filesystem/shell tool contracts
//! - `llm`: completion gateway client and retry policy layer
//! - `chat`: interactive REPL over the same primitives
//! - `audit` / `analytics`: JSON-lines audit trail and usage reports
//! - `undo`: git-stash snapshots for reverting destructive tools

pub mod agent;
pub mod analytics;
pub mod audit;
pub mod chat;
pub mod config;
pub mod llm;
pub mod tools;
pub mod undo;

pub use agent::{AgentRunner, Decision, RunResult};
pub use audit::AuditLogger;
pub use config::Config;
pub use llm::{CompletionClient, GatewayClient};
