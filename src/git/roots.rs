//! Root discovery
//!
//! Turns the workspace roots a client advertises into the repositories
//! this server can operate on.

use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use super::GitBackend;

/// Find the working-tree root containing `path`, searching upwards
///
/// An empty path means the process working directory.
pub fn find_git_root(path: &Path) -> Option<PathBuf> {
    let start = if path.as_os_str().is_empty() {
        std::env::current_dir().ok()?
    } else {
        path.to_path_buf()
    };

    GitBackend::discover(&start)
        .ok()
        .and_then(|backend| backend.work_tree())
}

/// Whether `path` is itself the root of a non-bare working tree
pub fn is_working_tree_root(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }

    let Some(work_tree) = GitBackend::open(path)
        .ok()
        .and_then(|backend| backend.work_tree())
    else {
        return false;
    };

    match (work_tree.canonicalize(), path.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Keep the `file://` URIs that name working-tree roots
///
/// Anything else is skipped; one bad entry never fails the whole list.
pub fn filter_git_roots<I, S>(uris: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    uris.into_iter()
        .filter_map(|uri| {
            let uri = uri.as_ref();
            let path = Url::parse(uri)
                .ok()
                .filter(|url| url.scheme() == "file")
                .and_then(|url| url.to_file_path().ok());

            match path {
                Some(path) if is_working_tree_root(&path) => Some(path),
                Some(path) => {
                    debug!("Root {} is not a working tree", path.display());
                    None
                }
                None => {
                    debug!("Ignoring root URI {}", uri);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_uri(path: &Path) -> String {
        Url::from_file_path(path).unwrap().to_string()
    }

    #[test]
    fn test_filter_keeps_only_repository_roots() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("repo");
        let plain = temp.path().join("plain");
        std::fs::create_dir_all(&repo).unwrap();
        std::fs::create_dir_all(&plain).unwrap();
        gix::init(&repo).unwrap();

        let nested = repo.join("src");
        std::fs::create_dir_all(&nested).unwrap();

        let uris = vec![
            file_uri(&repo),
            file_uri(&plain),
            file_uri(&nested),
            "https://example.com/repo".to_string(),
            "not a uri".to_string(),
            file_uri(&temp.path().join("missing")),
        ];

        let roots = filter_git_roots(&uris);
        assert_eq!(roots, vec![repo]);
    }

    #[test]
    fn test_filter_empty() {
        assert!(filter_git_roots(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_find_git_root_from_subdirectory() {
        let temp = TempDir::new().unwrap();
        gix::init(temp.path()).unwrap();
        let nested = temp.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let root = find_git_root(&nested).unwrap();
        assert_eq!(
            root.canonicalize().unwrap(),
            temp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_bare_repository_is_not_a_root() {
        let temp = TempDir::new().unwrap();
        gix::init_bare(temp.path()).unwrap();
        assert!(!is_working_tree_root(temp.path()));
    }
}
