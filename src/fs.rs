//! Atomic file writes
//!
//! Content goes to a temporary file in the target's directory, is synced to disk and
//! then renamed over the target, so readers see either the old or the new file.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

/// Atomically replace `path` with `content`.
///
/// The parent directory must already exist. Permissions of an existing target are
/// carried over to the replacement on Unix.
pub fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    #[cfg(unix)]
    if let Ok(metadata) = std::fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }

    temp.persist(path).map_err(|e| e.error)?;
    fsync_parent_dir(parent)?;
    debug!("Wrote {} bytes to {:?}", content.len(), path);
    Ok(())
}

#[cfg(unix)]
fn fsync_parent_dir(parent: &Path) -> std::io::Result<()> {
    std::fs::File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn fsync_parent_dir(_parent: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Follow symlinks at `path` to the file they point at.
///
/// Dangling links resolve to their (possibly missing) target so that a write
/// creates it. Paths that are not links are returned unchanged.
pub fn resolve_symlink(path: &Path) -> std::io::Result<PathBuf> {
    const MAX_HOPS: usize = 40;

    let mut current = path.to_path_buf();
    for _ in 0..MAX_HOPS {
        match std::fs::symlink_metadata(&current) {
            Ok(metadata) if metadata.file_type().is_symlink() => {}
            Ok(_) => return Ok(current),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(current),
            Err(e) => return Err(e),
        }

        if let Ok(target) = std::fs::canonicalize(&current) {
            return Ok(target);
        }

        let target = std::fs::read_link(&current)?;
        current = if target.is_absolute() {
            target
        } else {
            current
                .parent()
                .map(|parent| parent.join(&target))
                .unwrap_or(target)
        };
    }

    Err(std::io::Error::other(format!(
        "too many levels of symbolic links at {}",
        path.display()
    )))
}

/// Like [`atomic_write`], creating missing parent directories first.
pub fn atomic_write_create_dirs(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    atomic_write(path, content)
}
