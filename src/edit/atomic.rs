//! Atomic file replacement
//!
//! Content goes to a temp file in the destination directory which is then
//! renamed over the target, so readers see either the old or the new
//! file and never a partial write.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

/// Atomically replace (or create) `path` with `contents`
///
/// Runs on the blocking pool. Existing Unix permissions are preserved, and
/// an existing symlink is kept: its target is what gets replaced.
pub async fn atomic_write(path: &Path, contents: &str) -> std::io::Result<()> {
    let path = path.to_path_buf();
    let contents = contents.to_owned();

    tokio::task::spawn_blocking(move || write_blocking(&path, contents.as_bytes()))
        .await
        .map_err(std::io::Error::other)?
}

fn write_blocking(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let resolved = path.canonicalize().ok();
    let path = resolved.as_deref().unwrap_or(path);

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    #[cfg(unix)]
    let existing_mode = {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path).ok().map(|m| m.permissions().mode())
    };

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    if let Some(mode) = existing_mode {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(mode))?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    debug!(path = %path.display(), bytes = bytes.len(), "atomic write complete");

    Ok(())
}
