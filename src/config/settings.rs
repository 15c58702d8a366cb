//! Server configuration settings
//!
//! Layered configuration: defaults → config file → environment variables → CLI args

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, Result};

/// Environment variable prefix (`GIT_MCP_PORT`, `GIT_MCP_SED_ENABLED`, ...)
pub const ENV_PREFIX: &str = "GIT_MCP_";

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the SSE transport binds to
    pub host: String,

    /// Port the SSE transport listens on
    pub port: u16,

    /// Maximum concurrent child processes
    pub max_concurrent_processes: usize,

    /// Timeout for external commands in seconds (unset = wait forever)
    pub command_timeout_secs: Option<u64>,

    /// Run `tsc` after edits to TypeScript/JavaScript files
    pub typecheck_enabled: bool,

    /// Timeout for the type-check pass in seconds (unset = wait forever)
    pub typecheck_timeout_secs: Option<u64>,

    /// Try `sed` before the in-process search-and-replace
    pub sed_enabled: bool,

    /// Reject argument bags carrying keys the tool does not declare
    pub strict_arguments: bool,

    /// How long to wait for a client's `roots/list` answer
    pub roots_timeout_secs: u64,

    /// Explicit project configuration file, highest precedence
    pub project_config_file: Option<PathBuf>,

    /// Explicit `.env` file, highest precedence
    pub project_env_file: Option<PathBuf>,

    /// Enable debug logging
    pub debug: bool,

    /// Log file path (if set, logs to file instead of stderr)
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_concurrent_processes: 16,
            command_timeout_secs: None,
            typecheck_enabled: true,
            typecheck_timeout_secs: None,
            sed_enabled: true,
            strict_arguments: false,
            roots_timeout_secs: 10,
            project_config_file: None,
            project_env_file: None,
            debug: false,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from all sources
    ///
    /// `explicit` replaces the default config file location. A missing
    /// explicit file is an error; a missing default file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigError::FileNotFound(path.to_path_buf()).into());
            }
            Some(path) => path.to_path_buf(),
            None => Self::config_file_path()?,
        };

        Self::figment(&config_path)
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()).into())
    }

    /// The provider stack behind [`Config::load`]
    pub fn figment(config_path: &Path) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Config::default()))
            // Layer config file if it exists
            .merge(Toml::file(config_path))
            // Layer environment variables
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Get the configuration file path
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Command timeout as a `Duration`
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    /// Type-check timeout as a `Duration`
    pub fn typecheck_timeout(&self) -> Option<Duration> {
        self.typecheck_timeout_secs.map(Duration::from_secs)
    }

    /// Roots request timeout as a `Duration`
    pub fn roots_timeout(&self) -> Duration {
        Duration::from_secs(self.roots_timeout_secs)
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_processes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_concurrent_processes".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "host".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "git-mcp-server", "git-mcp-server").ok_or_else(|| {
            Error::Config(ConfigError::LoadFailed(
                "Could not determine home directory".to_string(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert_eq!(config.max_concurrent_processes, 16);
        assert_eq!(config.command_timeout(), None);
        assert!(config.typecheck_enabled);
        assert!(config.sed_enabled);
        assert!(!config.strict_arguments);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("port"));
        assert!(toml.contains("sed_enabled"));
    }

    #[test]
    fn test_file_layer_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = 9123\nsed_enabled = false\ncommand_timeout_secs = 30\n")
            .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.port, 9123);
        assert!(!config.sed_enabled);
        assert_eq!(config.command_timeout(), Some(Duration::from_secs(30)));
        // Untouched keys keep their defaults
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/git-mcp.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_env_layer_wins() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.toml", "port = 9000")?;
            jail.set_env("GIT_MCP_PORT", "9999");
            jail.set_env("GIT_MCP_STRICT_ARGUMENTS", "true");

            let config: Config = Config::figment(Path::new("config.toml")).extract()?;
            assert_eq!(config.port, 9999);
            assert!(config.strict_arguments);
            Ok(())
        });
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = Config {
            max_concurrent_processes: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
