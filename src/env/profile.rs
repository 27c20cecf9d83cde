//! Managed lines inside user-owned shell profiles

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::error::EnvError;
use crate::env::file::posix_quote;
use crate::env::user_store::{UserEnvironment, prepend_user_path};
use crate::fs::{atomic_write, resolve_symlink};

/// Marker identifying the PATH line this tool manages
pub const PATH_MARKER: &str = "Added by ccui setup";

/// Insert or replace the line tagged with `marker` in the profile at `path`.
///
/// The managed line is written as `<line> # <marker>`. The first tagged line is
/// replaced in place and further tagged lines are dropped; without one the line is
/// appended. All other bytes are kept. Returns whether the file changed.
pub fn merge_shell_profile_line(path: &Path, marker: &str, line: &str) -> Result<bool, EnvError> {
    if marker.trim().is_empty() || marker.contains(['\n', '\r']) {
        return Err(EnvError::InvalidInput(format!("invalid marker {:?}", marker)));
    }
    if line.contains(['\n', '\r']) {
        return Err(EnvError::InvalidInput(
            "managed line spans multiple lines".to_string(),
        ));
    }

    // Write through symlinked profiles so the link survives
    let target = resolve_symlink(path).map_err(|source| EnvError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let content = match std::fs::read_to_string(&target) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(EnvError::NotWritable {
                path: target,
                source: e,
            });
        }
        Err(source) => {
            return Err(EnvError::Io {
                path: target,
                source,
            });
        }
    };

    let merged = merge_line(&content, marker, line);
    if merged == content {
        debug!("{:?} already has the managed line", target);
        return Ok(false);
    }

    atomic_write(&target, merged.as_bytes()).map_err(EnvError::not_writable(&target))?;
    info!("Updated managed line in {:?}", target);
    Ok(true)
}

fn merge_line(content: &str, marker: &str, line: &str) -> String {
    let tag = format!("# {}", marker);
    let managed = format!("{} {}", line, tag);

    let mut merged = String::with_capacity(content.len() + managed.len() + 1);
    let mut replaced = false;

    for raw in content.split_inclusive('\n') {
        let body = raw.trim_end_matches(['\n', '\r']);
        if !body.trim_end().ends_with(&tag) {
            merged.push_str(raw);
            continue;
        }
        if !replaced {
            merged.push_str(&managed);
            merged.push_str(&raw[body.len()..]);
            replaced = true;
        }
    }

    if !replaced {
        if !merged.is_empty() && !merged.ends_with('\n') {
            merged.push('\n');
        }
        merged.push_str(&managed);
        merged.push('\n');
    }

    merged
}

/// `export PATH="<dir>:$PATH"`
pub fn path_export_line(bin_dir: &Path) -> String {
    let quoted = posix_quote(&bin_dir.to_string_lossy());
    let escaped = &quoted[1..quoted.len() - 1];
    format!("export PATH=\"{}:$PATH\"", escaped)
}

/// Targets touched by [`ensure_bin_on_path`]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PathReport {
    /// Profiles whose content changed
    pub updated_profiles: Vec<PathBuf>,
    /// Whether the user environment store's PATH changed
    pub user_path_updated: bool,
}

/// Put `bin_dir` on PATH for future shells and, where supported, for the user
/// environment store.
pub fn ensure_bin_on_path(
    bin_dir: &Path,
    profiles: &[PathBuf],
    store: &dyn UserEnvironment,
) -> Result<PathReport, EnvError> {
    let line = path_export_line(bin_dir);
    let mut report = PathReport::default();

    for profile in profiles {
        if merge_shell_profile_line(profile, PATH_MARKER, &line)? {
            report.updated_profiles.push(profile.clone());
        }
    }

    report.user_path_updated = prepend_user_path(store, bin_dir)?;
    Ok(report)
}
