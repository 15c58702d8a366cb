//! File mutators
//!
//! Write, search-and-replace and patch application against a working
//! tree, plus the read-only file view. Every mutator reads the pre-image
//! first, writes atomically, and reports the effect as a unified diff.
//!
//! Like the repository operations, these return text: expected failures
//! (missing file, bad pattern, patch that does not apply) are part of the
//! result, not an `Err`.

mod atomic;
mod diff;
mod patch;
mod read;
mod replace;
mod typecheck;
mod write;

pub use atomic::*;
pub use diff::*;
pub use patch::*;
pub use read::*;
pub use replace::*;
pub use typecheck::*;

use std::path::{Component, Path, PathBuf};

use crate::git::WorkingTree;

/// Resolve `file_path` against `root`, refusing anything that escapes it
///
/// Resolution is lexical (`..` is folded) so it works for files that do
/// not exist yet. When the path or one of its ancestors exists, symlinks
/// are resolved as well and must still land inside `root`.
pub fn resolve_in_tree(root: &Path, file_path: &str) -> Option<PathBuf> {
    if file_path.is_empty() {
        return None;
    }

    let requested = Path::new(file_path);
    let relative = if requested.is_absolute() {
        requested.strip_prefix(root).ok()?
    } else {
        requested
    };

    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if resolved == root {
                    return None;
                }
                resolved.pop();
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    let canonical_root = root.canonicalize().ok()?;
    let existing = resolved.ancestors().find(|p| p.exists())?;
    if !existing.canonicalize().ok()?.starts_with(&canonical_root) {
        return None;
    }

    Some(resolved)
}

/// Mutators bound to one working tree for the duration of a call
pub struct FileEditor<'a> {
    tree: &'a WorkingTree,
    typecheck: &'a TypeChecker,
    pipeline: &'a ReplacePipeline,
}

impl<'a> FileEditor<'a> {
    pub fn new(
        tree: &'a WorkingTree,
        typecheck: &'a TypeChecker,
        pipeline: &'a ReplacePipeline,
    ) -> Self {
        Self {
            tree,
            typecheck,
            pipeline,
        }
    }

    pub fn root(&self) -> &Path {
        self.tree.root()
    }

    fn resolve(&self, file_path: &str) -> Option<PathBuf> {
        resolve_in_tree(self.tree.root(), file_path)
    }

    async fn typecheck(&self, file_path: &str) -> String {
        self.typecheck.check(self.tree.root(), file_path).await
    }
}
