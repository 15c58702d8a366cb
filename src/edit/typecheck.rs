//! Advisory type-check pass for script files
//!
//! After a successful edit of a TypeScript/JavaScript file, runs
//! `tsc --noEmit --allowJs <file>` and appends whatever it reports. The
//! outcome never changes the outcome of the edit itself.

use std::path::Path;

use tracing::{debug, warn};

use crate::process::{EnvOverlay, ProcessRunner};

/// Extensions that trigger the pass
pub const TYPECHECK_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mts", "cts", "mjs", "cjs"];

/// Whether `file_path` names a file the type checker understands
pub fn is_typecheckable(file_path: &str) -> bool {
    Path::new(file_path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TYPECHECK_EXTENSIONS.contains(&ext))
}

/// Quote `arg` for a POSIX shell
pub fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

#[derive(Debug, Clone)]
pub struct TypeChecker {
    enabled: bool,
    runner: ProcessRunner,
    env: EnvOverlay,
}

impl TypeChecker {
    pub fn new(runner: ProcessRunner) -> Self {
        Self {
            enabled: true,
            runner,
            env: EnvOverlay::new(),
        }
    }

    /// A checker that never runs
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            runner: ProcessRunner::new(),
            env: EnvOverlay::new(),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_env(mut self, env: EnvOverlay) -> Self {
        self.env = env;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Run the checker for `file_path` (relative to `root`)
    ///
    /// Returns an empty string when the pass does not apply, otherwise a
    /// `TSC Output for` section starting with a blank line.
    pub async fn check(&self, root: &Path, file_path: &str) -> String {
        if !self.enabled || !is_typecheckable(file_path) {
            return String::new();
        }

        let command = format!("tsc --noEmit --allowJs {}", shell_quote(file_path));
        debug!("Type-checking with: {}", command);

        let report = match self.runner.run_shell(&command, root, &self.env).await {
            Ok(output) => output.to_report(),
            Err(e) => {
                warn!("Type check of {} failed: {}", file_path, e);
                format!("Type check could not run: {}", e)
            }
        };

        format!("\n\nTSC Output for {}:\n{}", file_path, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_typecheckable() {
        assert!(is_typecheckable("test.ts"));
        assert!(is_typecheckable("src/app.tsx"));
        assert!(is_typecheckable("test.js"));
        assert!(is_typecheckable("lib/index.mjs"));
        assert!(!is_typecheckable("test.py"));
        assert!(!is_typecheckable("README"));
        assert!(!is_typecheckable("archive.ts.bak"));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("a.ts"), "'a.ts'");
        assert_eq!(shell_quote("it's.ts"), r"'it'\''s.ts'");
    }

    #[tokio::test]
    async fn test_non_script_files_are_skipped() {
        let temp = TempDir::new().unwrap();
        let checker = TypeChecker::new(ProcessRunner::new());
        assert_eq!(checker.check(temp.path(), "test.py").await, "");
    }

    #[tokio::test]
    async fn test_disabled_checker_is_silent() {
        let temp = TempDir::new().unwrap();
        let checker = TypeChecker::disabled();
        assert!(!checker.is_enabled());
        assert_eq!(checker.check(temp.path(), "test.ts").await, "");
    }

    #[tokio::test]
    async fn test_script_files_report_output() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("test.ts"), "let x: number = 1;\n").unwrap();

        // Whether or not tsc is installed, the section header is present
        let checker = TypeChecker::new(ProcessRunner::new());
        let output = checker.check(temp.path(), "test.ts").await;
        assert!(output.starts_with("\n\nTSC Output for test.ts:\n"));
    }
}
