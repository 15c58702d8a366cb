//! Working tree handle
//!
//! A validated repository root plus the process runner used to drive the
//! git CLI against it. Opened fresh for every tool call and never cached,
//! so out-of-band changes are always visible and no lock outlives a call.

use std::path::{Path, PathBuf};

use tracing::instrument;

use super::GitBackend;
use crate::error::{GitError, Result};
use crate::process::{CommandOutput, ProcessRunner};

/// Config overrides passed to every git invocation
const GIT_PREFIX: [&str; 4] = ["-c", "color.ui=never", "-c", "core.quotepath=off"];

/// A resolved, non-bare working tree
#[derive(Debug, Clone)]
pub struct WorkingTree {
    root: PathBuf,
    runner: ProcessRunner,
}

impl WorkingTree {
    /// Open the working tree rooted at `path`
    ///
    /// Fails fast if `path` is not a directory holding repository
    /// metadata, or if the repository is bare.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, runner: ProcessRunner) -> Result<Self> {
        let path = path.as_ref();

        if !path.is_dir() {
            return Err(GitError::NotARepository(path.to_path_buf()).into());
        }

        let backend = GitBackend::open(path)?;
        let root = backend
            .work_tree()
            .ok_or_else(|| GitError::BareRepository(path.to_path_buf()))?;

        Ok(Self { root, runner })
    }

    /// Root directory of the working tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The runner used for git and shell commands
    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    /// Reopen the repository for a gitoxide query
    pub(crate) fn backend(&self) -> Result<GitBackend> {
        GitBackend::open(&self.root)
    }

    /// Run `git <args>` in the working tree root
    pub(crate) async fn git(&self, args: &[&str], stdin: Option<&str>) -> Result<CommandOutput> {
        let argv: Vec<&str> = std::iter::once("git")
            .chain(GIT_PREFIX)
            .chain(args.iter().copied())
            .collect();

        self.runner.run(&argv, &self.root, stdin).await
    }

    /// Run git and return stdout, or a descriptive error text
    pub(crate) async fn git_text(&self, args: &[&str]) -> std::result::Result<String, String> {
        let command = args.first().copied().unwrap_or("git");
        match self.git(args, None).await {
            Ok(output) if output.success() => Ok(output.stdout),
            Ok(output) => Err(format!(
                "Error running git {}: {}",
                command,
                output.failure_text()
            )),
            Err(e) => Err(format!("Error running git {}: {}", command, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    #[test]
    fn test_open_rejects_plain_directory() {
        let temp = TempDir::new().unwrap();
        let err = WorkingTree::open(temp.path(), ProcessRunner::new()).unwrap_err();
        assert!(matches!(err, Error::Git(GitError::NotARepository(_))));
    }

    #[test]
    fn test_open_rejects_missing_path() {
        let err = WorkingTree::open("/nonexistent/path/shouldnotexist", ProcessRunner::new())
            .unwrap_err();
        assert!(matches!(err, Error::Git(GitError::NotARepository(_))));
    }

    #[test]
    fn test_open_rejects_bare_repository() {
        let temp = TempDir::new().unwrap();
        gix::init_bare(temp.path()).unwrap();
        let err = WorkingTree::open(temp.path(), ProcessRunner::new()).unwrap_err();
        assert!(matches!(err, Error::Git(GitError::BareRepository(_))));
    }

    #[test]
    fn test_open_accepts_fresh_repository() {
        let temp = TempDir::new().unwrap();
        gix::init(temp.path()).unwrap();
        let tree = WorkingTree::open(temp.path(), ProcessRunner::new()).unwrap();
        assert_eq!(
            tree.root().canonicalize().unwrap(),
            temp.path().canonicalize().unwrap()
        );
    }
}
