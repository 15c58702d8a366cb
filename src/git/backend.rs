//! Git backend using pure gitoxide
//!
//! Read-only repository queries: opening and validating a working tree,
//! branch lookups, revision resolution.

use std::path::{Path, PathBuf};

use gix::Repository;
use tracing::{debug, instrument};

use crate::error::{GitError, Result};

/// Git backend using gitoxide
///
/// Short-lived: callers open one, ask their questions, and drop it before
/// the next suspension point.
pub struct GitBackend {
    /// The gitoxide repository handle
    repo: Repository,
}

impl GitBackend {
    /// Open an existing repository at exactly `path`
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let repo = gix::open(&path).map_err(|e| {
            debug!("gix::open failed: {}", e);
            GitError::NotARepository(path.clone())
        })?;

        debug!("Opened repository at {:?}", path);

        Ok(Self { repo })
    }

    /// Discover repository from a path (searches parent directories)
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn discover(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let repo = gix::discover(path).map_err(|_e| GitError::NotARepository(path.to_path_buf()))?;

        debug!("Discovered repository at {:?}", repo.path());

        Ok(Self { repo })
    }

    /// Root of the working tree, `None` for bare repositories
    pub fn work_tree(&self) -> Option<PathBuf> {
        self.repo.work_dir().map(Path::to_path_buf)
    }

    /// Get the current branch name
    ///
    /// Unborn branches report their future name; a detached HEAD reports
    /// the full commit id so it can be used as a revision.
    pub fn current_branch(&self) -> Result<String> {
        let head = self.repo.head().map_err(|e| GitError::Gix(e.to_string()))?;

        match head.kind {
            gix::head::Kind::Symbolic(reference) => Ok(reference.name.shorten().to_string()),
            gix::head::Kind::Unborn(full_name) => Ok(full_name.shorten().to_string()),
            gix::head::Kind::Detached { target, .. } => Ok(target.to_string()),
        }
    }

    /// Check if a local branch exists
    pub fn branch_exists(&self, branch_name: &str) -> Result<bool> {
        let full_name = format!("refs/heads/{}", branch_name);

        let found = self
            .repo
            .try_find_reference(full_name.as_str())
            .map_err(|e| GitError::InvalidRef(format!("{}: {}", branch_name, e)))?;

        Ok(found.is_some())
    }

    /// Resolve a revision (branch, tag, sha, `HEAD~2`, ...) to a commit id
    ///
    /// Returns `None` when the revision does not name a commit.
    pub fn resolve_commit(&self, revision: &str) -> Result<Option<String>> {
        let spec = format!("{}^{{commit}}", revision);

        match self.repo.rev_parse_single(spec.as_str()) {
            Ok(id) => Ok(Some(id.detach().to_string())),
            Err(e) => {
                debug!("Could not resolve '{}': {}", revision, e);
                Ok(None)
            }
        }
    }
}
