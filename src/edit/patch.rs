//! Patch application through `git apply`
//!
//! A dry run gates every real application, first for a plain apply and
//! then for a three-way merge, so a multi-file patch either applies as a
//! whole or not at all. A three-way merge that still conflicts is rolled
//! back to the snapshots taken before it ran.

use std::io::ErrorKind;

use tracing::{info, instrument, warn};

use super::{FileEditor, atomic_write, render_diff};
use crate::error::Result;

/// Paths named by `--- a/` and `+++ b/` headers, in order of appearance
pub fn affected_paths(patch: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();

    for line in patch.lines() {
        let Some(rest) = line
            .strip_prefix("--- a/")
            .or_else(|| line.strip_prefix("+++ b/"))
        else {
            continue;
        };

        // git may append a tab and a timestamp
        let path = rest.split('\t').next().unwrap_or(rest).trim_end();
        if !path.is_empty() && !paths.iter().any(|p| p == path) {
            paths.push(path.to_string());
        }
    }

    paths
}

impl FileEditor<'_> {
    /// Apply a unified diff to the working tree
    #[instrument(skip_all, fields(bytes = patch.len()))]
    pub async fn apply_patch(&self, patch: &str) -> String {
        let paths = affected_paths(patch);

        let mut snapshots = Vec::with_capacity(paths.len());
        for path in &paths {
            snapshots.push(self.snapshot(path).await);
        }

        match self.git_apply(patch, &paths, &snapshots).await {
            Ok(Ok(())) => {}
            Ok(Err(stderr)) => return format!("Error applying diff: {}", stderr),
            Err(e) => return format!("An unexpected error occurred: {}", e),
        }
        info!("Applied patch touching {} file(s)", paths.len());

        let mut result = String::from("Diff applied successfully");
        for (path, before) in paths.iter().zip(&snapshots) {
            let after = self.snapshot(path).await.unwrap_or_default();
            result.push_str(&format!(
                "\nChanges in {}:\n{}",
                path,
                render_diff(before.as_deref().unwrap_or(""), &after, path)
            ));
        }
        for path in &paths {
            result.push_str(&self.typecheck(path).await);
        }
        result
    }

    /// Current content of `path`, `None` if it does not exist
    async fn snapshot(&self, path: &str) -> Option<String> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(full).await.ok()
    }

    /// `Ok(Err(stderr))` when git rejects the patch; the tree is then unchanged
    async fn git_apply(
        &self,
        patch: &str,
        paths: &[String],
        snapshots: &[Option<String>],
    ) -> Result<std::result::Result<(), String>> {
        let tree = self.tree;

        let check = tree.git(&["apply", "--check", "-"], Some(patch)).await?;
        if check.success() {
            let applied = tree.git(&["apply", "-"], Some(patch)).await?;
            return Ok(if applied.success() {
                Ok(())
            } else {
                Err(applied.failure_text())
            });
        }

        // The dry run does not detect content conflicts of a three-way merge
        let merge_check = tree
            .git(&["apply", "--check", "--3way", "-"], Some(patch))
            .await?;
        if merge_check.success() {
            warn!("Patch needs a three-way merge");
            let index = tree.git(&["write-tree"], None).await?;
            let index = index.success().then(|| index.stdout.trim().to_string());

            let applied = tree.git(&["apply", "--3way", "-"], Some(patch)).await?;
            if applied.success() {
                return Ok(Ok(()));
            }

            warn!("Three-way merge conflicted, restoring {} file(s)", paths.len());
            self.restore(paths, snapshots, index.as_deref()).await?;
            return Ok(Err(applied.failure_text()));
        }

        Ok(Err(check.failure_text()))
    }

    /// Put back the pre-images and the saved index (or unstage `paths`)
    async fn restore(
        &self,
        paths: &[String],
        snapshots: &[Option<String>],
        index_tree: Option<&str>,
    ) -> Result<()> {
        for (path, before) in paths.iter().zip(snapshots) {
            let Some(full) = self.resolve(path) else {
                continue;
            };
            match before {
                Some(content) => atomic_write(&full, content).await?,
                None => match tokio::fs::remove_file(&full).await {
                    Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
                    _ => {}
                },
            }
        }

        let output = match index_tree {
            Some(id) => self.tree.git(&["read-tree", id], None).await?,
            None => {
                let mut args = vec!["reset", "-q", "--"];
                args.extend(paths.iter().map(String::as_str));
                self.tree.git(&args, None).await?
            }
        };
        if !output.success() {
            warn!("Could not restore the index: {}", output.failure_text());
        }
        Ok(())
    }
}
