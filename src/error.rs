//! Error types for git-mcp-server
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `Display` and `Error` impls.
//!
//! Only protocol-level failures live here. Expected tool-level failures
//! (missing branch, patch that does not apply, invalid pattern) are turned
//! into result text by the handlers and never become an [`Error`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type for git-mcp-server
#[derive(Error, Debug)]
pub enum Error {
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is the unknown-tool case the transport reports specially
    pub fn is_unknown_tool(&self) -> bool {
        matches!(self, Error::Tool(ToolError::UnknownTool(_)))
    }
}

/// Dispatch errors: the caller sent something the catalog cannot run
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing required argument '{argument}' for tool '{tool}'")]
    MissingArgument { tool: String, argument: String },

    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },
}

/// Git repository errors
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("Repository has no working tree: {0}")]
    BareRepository(PathBuf),

    #[error("Gitoxide error: {0}")]
    Gix(String),

    #[error("Invalid reference: {0}")]
    InvalidRef(String),
}

/// External process errors
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Empty command line")]
    EmptyCommand,

    #[error("Failed to start '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("'{program}' timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("I/O failure while talking to '{program}': {reason}")]
    Io { program: String, reason: String },

    #[error("Semaphore acquire failed")]
    SemaphoreError,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),
}

/// Transport (MCP session) errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Session {0} is closed")]
    SessionClosed(String),

    #[error("Client did not answer '{method}' within {timeout:?}")]
    RequestTimeout { method: String, timeout: Duration },

    #[error("Client returned an error for '{method}': {message}")]
    ClientError { method: String, message: String },

    #[error("Malformed message: {0}")]
    Malformed(String),
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;

/// Convenience trait for converting gitoxide errors
impl From<gix::open::Error> for GitError {
    fn from(e: gix::open::Error) -> Self {
        GitError::Gix(e.to_string())
    }
}

impl From<gix::discover::Error> for GitError {
    fn from(e: gix::discover::Error) -> Self {
        GitError::Gix(e.to_string())
    }
}
