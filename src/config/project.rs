//! Per-repository project configuration
//!
//! Key-value settings (`.git-mcp.yml`) and an environment overlay (`.env`)
//! gathered from, in increasing precedence:
//! 1. the home directory
//! 2. the working-tree root
//! 3. the process working directory
//! 4. an explicitly named file
//!
//! Every layer is optional. Missing files are skipped silently; malformed
//! files log a warning and contribute nothing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use figment::{
    Figment,
    providers::{Format, Yaml},
};
use tracing::{debug, warn};

use crate::git::find_git_root;
use crate::process::EnvOverlay;

/// Project configuration file name
pub const PROJECT_CONFIG_FILE: &str = ".git-mcp.yml";

/// Environment overlay file name
pub const ENV_FILE: &str = ".env";

/// Merged key-value configuration
pub type ConfigMap = BTreeMap<String, serde_json::Value>;

/// Directories and files to look in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSources {
    pub home: Option<PathBuf>,
    pub repo_root: Option<PathBuf>,
    pub cwd: Option<PathBuf>,
    pub explicit_config: Option<PathBuf>,
    pub explicit_env: Option<PathBuf>,
}

impl ConfigSources {
    /// Resolve the standard locations for a working directory
    pub fn discover(
        working_dir: &Path,
        explicit_config: Option<&Path>,
        explicit_env: Option<&Path>,
    ) -> Self {
        Self {
            home: BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()),
            repo_root: find_git_root(working_dir),
            cwd: std::env::current_dir().ok(),
            explicit_config: explicit_config.map(Path::to_path_buf),
            explicit_env: explicit_env.map(Path::to_path_buf),
        }
    }

    /// Candidate `.git-mcp.yml` files, lowest precedence first
    pub fn config_files(&self) -> Vec<PathBuf> {
        self.layered(PROJECT_CONFIG_FILE, self.explicit_config.as_deref())
    }

    /// Candidate `.env` files, lowest precedence first
    pub fn env_files(&self) -> Vec<PathBuf> {
        self.layered(ENV_FILE, self.explicit_env.as_deref())
    }

    fn layered(&self, file_name: &str, explicit: Option<&Path>) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = Vec::new();
        let dirs = [&self.home, &self.repo_root, &self.cwd];

        for dir in dirs.into_iter().flatten() {
            let candidate = dir.join(file_name);
            if !files.contains(&candidate) {
                files.push(candidate);
            }
        }
        if let Some(path) = explicit {
            let path = path.to_path_buf();
            files.retain(|f| f != &path);
            files.push(path);
        }
        files
    }
}

/// Project settings plus environment overlay for one working tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectConfig {
    pub values: ConfigMap,
    pub env: EnvOverlay,
}

impl ProjectConfig {
    /// Load and merge every layer named by `sources`
    pub fn load(sources: &ConfigSources) -> Self {
        Self {
            values: load_config_files(&sources.config_files()),
            env: load_env_files(&sources.env_files()),
        }
    }

    /// Boolean setting, if present and actually a boolean
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(serde_json::Value::as_bool)
    }
}

/// Shallow-merge YAML mappings; later files override earlier keys
pub fn load_config_files(paths: &[PathBuf]) -> ConfigMap {
    let mut merged = ConfigMap::new();
    for path in paths {
        if let Some(values) = read_yaml(path) {
            merged.extend(values);
        }
    }
    merged
}

/// Merge `.env` files; later files override earlier variables
pub fn load_env_files(paths: &[PathBuf]) -> EnvOverlay {
    let mut merged = EnvOverlay::new();
    for path in paths {
        if let Some(vars) = read_env(path) {
            merged.extend(vars);
        }
    }
    merged
}

fn read_yaml(path: &Path) -> Option<ConfigMap> {
    if !path.is_file() {
        return None;
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Skipping unreadable config file {}: {}", path.display(), e);
            return None;
        }
    };
    if content.trim().is_empty() {
        return None;
    }

    match Figment::from(Yaml::string(&content)).extract::<ConfigMap>() {
        Ok(values) => {
            debug!("Loaded {} keys from {}", values.len(), path.display());
            Some(values)
        }
        Err(e) => {
            warn!("Skipping malformed config file {}: {}", path.display(), e);
            None
        }
    }
}

fn read_env(path: &Path) -> Option<EnvOverlay> {
    if !path.is_file() {
        return None;
    }

    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) => {
            warn!("Skipping unreadable env file {}: {}", path.display(), e);
            return None;
        }
    };

    match iter.collect::<Result<EnvOverlay, _>>() {
        Ok(vars) => {
            debug!("Loaded {} variables from {}", vars.len(), path.display());
            Some(vars)
        }
        Err(e) => {
            warn!("Skipping malformed env file {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sources(home: &Path, root: &Path, cwd: &Path) -> ConfigSources {
        ConfigSources {
            home: Some(home.to_path_buf()),
            repo_root: Some(root.to_path_buf()),
            cwd: Some(cwd.to_path_buf()),
            explicit_config: None,
            explicit_env: None,
        }
    }

    fn dirs(tmp: &TempDir) -> (PathBuf, PathBuf, PathBuf) {
        let home = tmp.path().join("home");
        let root = tmp.path().join("root");
        let cwd = tmp.path().join("cwd");
        for dir in [&home, &root, &cwd] {
            std::fs::create_dir_all(dir).unwrap();
        }
        (home, root, cwd)
    }

    #[test]
    fn test_config_precedence() {
        let tmp = TempDir::new().unwrap();
        let (home, root, cwd) = dirs(&tmp);

        std::fs::write(home.join(PROJECT_CONFIG_FILE), "a: 1\nshared: home\n").unwrap();
        std::fs::write(root.join(PROJECT_CONFIG_FILE), "b: 2\nshared: root\n").unwrap();
        std::fs::write(cwd.join(PROJECT_CONFIG_FILE), "c: 3\nshared: cwd\n").unwrap();
        let explicit = tmp.path().join("direct.yml");
        std::fs::write(&explicit, "d: 4\nshared: explicit\n").unwrap();

        let mut src = sources(&home, &root, &cwd);
        let values = load_config_files(&src.config_files());
        assert_eq!(values["a"], 1);
        assert_eq!(values["b"], 2);
        assert_eq!(values["c"], 3);
        assert_eq!(values["shared"], "cwd");

        src.explicit_config = Some(explicit);
        let values = load_config_files(&src.config_files());
        assert_eq!(values["d"], 4);
        assert_eq!(values["shared"], "explicit");
    }

    #[test]
    fn test_missing_and_empty_files_contribute_nothing() {
        let tmp = TempDir::new().unwrap();
        let (home, root, cwd) = dirs(&tmp);
        let empty = tmp.path().join("empty.yml");
        std::fs::write(&empty, "").unwrap();

        let mut src = sources(&home, &root, &cwd);
        src.explicit_config = Some(empty);
        assert!(ProjectConfig::load(&src).values.is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let (home, root, cwd) = dirs(&tmp);
        std::fs::write(root.join(PROJECT_CONFIG_FILE), "keep: true\n").unwrap();
        let bad = tmp.path().join("bad.yml");
        std::fs::write(&bad, "not: [valid: yaml").unwrap();

        let mut src = sources(&home, &root, &cwd);
        src.explicit_config = Some(bad);
        let config = ProjectConfig::load(&src);
        assert_eq!(config.get_bool("keep"), Some(true));
        assert_eq!(config.values.len(), 1);
    }

    #[test]
    fn test_env_layers() {
        let tmp = TempDir::new().unwrap();
        let (home, root, cwd) = dirs(&tmp);
        std::fs::write(home.join(ENV_FILE), "E=5\nSHARED=home\n").unwrap();
        std::fs::write(root.join(ENV_FILE), "C=3\nSHARED=root\n").unwrap();
        std::fs::write(cwd.join(ENV_FILE), "# This is a comment\nA=1\nB=2\n").unwrap();

        let env = load_env_files(&sources(&home, &root, &cwd).env_files());
        assert_eq!(env["A"], "1");
        assert_eq!(env["B"], "2");
        assert_eq!(env["C"], "3");
        assert_eq!(env["E"], "5");
        assert_eq!(env["SHARED"], "root");
    }

    #[test]
    fn test_env_quoting_and_export() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(ENV_FILE);
        std::fs::write(&path, "export Q=\"quoted value\"\nS='single'\n").unwrap();

        let env = load_env_files(&[path]);
        assert_eq!(env["Q"], "quoted value");
        assert_eq!(env["S"], "single");
    }

    #[test]
    fn test_malformed_env_file_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let (home, root, cwd) = dirs(&tmp);
        std::fs::write(root.join(ENV_FILE), "F=6\n").unwrap();
        let bad = tmp.path().join("bad.env");
        std::fs::write(&bad, "BADLINE").unwrap();

        let mut src = sources(&home, &root, &cwd);
        src.explicit_env = Some(bad);
        let env = load_env_files(&src.env_files());
        assert_eq!(env.len(), 1);
        assert_eq!(env["F"], "6");
    }

    #[test]
    fn test_same_directory_is_read_once() {
        let tmp = TempDir::new().unwrap();
        let (home, root, _) = dirs(&tmp);
        let src = sources(&home, &root, &root);
        assert_eq!(src.config_files().len(), 2);
    }
}
