//! Configuration module
//!
//! Handles:
//! - Server configuration (`~/.config/git-mcp-server/config.toml`, `GIT_MCP_*`)
//! - Per-repository project settings (`.git-mcp.yml`) and `.env` overlays

mod project;
mod settings;

pub use project::*;
pub use settings::*;
