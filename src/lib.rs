//! git-mcp-server - Git repository tools for AI agents
//!
//! Exposes a fixed catalog of repository operations (status, diff, commit,
//! branch, file edits, shell commands) over the Model Context Protocol.
//!
//! # Architecture
//!
//! A call flows through:
//! - **Transport** - JSON-RPC over HTTP + SSE, one session per client
//! - **Dispatcher** - validates the argument bag, opens the working tree,
//!   decodes typed arguments and runs the handler
//! - **Handlers** - repository operations and file mutators, which return
//!   text even when the underlying tool fails
//! - **Process runner** - every external command, with bounded concurrency
//!
//! # Modules
//!
//! - [`tools`] - Operation catalog and dispatcher
//! - [`git`] - Working trees, repository operations and root discovery
//! - [`edit`] - File writes, search-and-replace, patches and diff reports
//! - [`process`] - Async external process execution
//! - [`transport`] - MCP over HTTP + SSE
//! - [`config`] - Server configuration and per-repository settings
//! - [`error`] - Error types

pub mod config;
pub mod edit;
pub mod error;
pub mod git;
pub mod process;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{Error, Result};
pub use tools::{Content, Dispatcher, ToolName};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
