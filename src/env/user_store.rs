//! OS-level user environment stores
//!
//! GUI-launched applications do not read shell profiles, so variables are mirrored
//! into the store the session manager reads: `launchctl` on macOS, the registry via
//! `setx` on Windows. Other platforms have no such store.

#[cfg(test)]
use mockall::automock;

use std::path::Path;

use tracing::{debug, info};

use crate::env::error::EnvError;
use crate::env::file::EnvVarSet;
use crate::process::{CommandOutput, ProcessError, run_blocking};

/// A persistent per-user environment store
#[cfg_attr(test, automock)]
pub trait UserEnvironment: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Whether the platform actually has this store
    fn is_supported(&self) -> bool;

    /// Separator between PATH entries
    fn path_separator(&self) -> char;

    fn get(&self, name: &str) -> Result<Option<String>, EnvError>;

    fn set(&self, name: &str, value: &str) -> Result<(), EnvError>;
}

fn store_error(store: &'static str, name: &str, message: impl ToString) -> EnvError {
    EnvError::Store {
        store,
        name: name.to_string(),
        message: message.to_string(),
    }
}

fn check_output(
    store: &'static str,
    name: &str,
    result: Result<CommandOutput, ProcessError>,
) -> Result<CommandOutput, EnvError> {
    let output = result.map_err(|e| store_error(store, name, e))?;
    if output.success() {
        Ok(output)
    } else {
        Err(store_error(store, name, &output.stderr))
    }
}

/// `launchctl getenv` / `launchctl setenv`
pub struct LaunchctlEnvironment;

impl UserEnvironment for LaunchctlEnvironment {
    fn name(&self) -> &'static str {
        "launchctl"
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn path_separator(&self) -> char {
        ':'
    }

    fn get(&self, name: &str) -> Result<Option<String>, EnvError> {
        let output = run_blocking("launchctl", &["getenv", name])
            .map_err(|e| store_error(self.name(), name, e))?;
        if !output.success() || output.stdout.is_empty() {
            return Ok(None);
        }
        Ok(Some(output.stdout))
    }

    fn set(&self, name: &str, value: &str) -> Result<(), EnvError> {
        check_output(
            self.name(),
            name,
            run_blocking("launchctl", &["setenv", name, value]),
        )?;
        Ok(())
    }
}

/// `reg query HKCU\Environment` / `setx`
pub struct WindowsUserEnvironment;

impl UserEnvironment for WindowsUserEnvironment {
    fn name(&self) -> &'static str {
        "setx"
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn path_separator(&self) -> char {
        ';'
    }

    fn get(&self, name: &str) -> Result<Option<String>, EnvError> {
        let output = run_blocking("reg", &["query", r"HKCU\Environment", "/v", name])
            .map_err(|e| store_error(self.name(), name, e))?;
        if !output.success() {
            return Ok(None);
        }
        Ok(parse_reg_query(&output.stdout, name))
    }

    fn set(&self, name: &str, value: &str) -> Result<(), EnvError> {
        check_output(self.name(), name, run_blocking("setx", &[name, value]))?;
        Ok(())
    }
}

/// Extract the value of `name` from `reg query` output such as
/// `    PATH    REG_EXPAND_SZ    C:\bin;C:\tools`
fn parse_reg_query(output: &str, name: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let line = line.trim();
        let (key, rest) = line.split_once(char::is_whitespace)?;
        if !key.eq_ignore_ascii_case(name) {
            return None;
        }
        let rest = rest.trim_start();
        if !rest.starts_with("REG_") {
            return None;
        }
        let value = rest
            .split_once(char::is_whitespace)
            .map(|(_, value)| value.trim())
            .unwrap_or_default();
        Some(value.to_string())
    })
}

/// Stand-in for platforms without a user environment store
pub struct NoopUserEnvironment;

impl UserEnvironment for NoopUserEnvironment {
    fn name(&self) -> &'static str {
        "none"
    }

    fn is_supported(&self) -> bool {
        false
    }

    fn path_separator(&self) -> char {
        ':'
    }

    fn get(&self, _name: &str) -> Result<Option<String>, EnvError> {
        Ok(None)
    }

    fn set(&self, _name: &str, _value: &str) -> Result<(), EnvError> {
        Ok(())
    }
}

/// The store for the platform this binary runs on
pub fn platform_store() -> Box<dyn UserEnvironment> {
    if cfg!(target_os = "macos") {
        Box::new(LaunchctlEnvironment)
    } else if cfg!(windows) {
        Box::new(WindowsUserEnvironment)
    } else {
        Box::new(NoopUserEnvironment)
    }
}

/// Mirror `vars` into the user environment store. Returns how many were set.
///
/// Unsupported stores are skipped silently.
pub fn sync_user_environment(
    store: &dyn UserEnvironment,
    vars: &EnvVarSet,
) -> Result<usize, EnvError> {
    if !store.is_supported() {
        debug!("No user environment store on this platform");
        return Ok(0);
    }

    for (name, value) in vars.iter() {
        store.set(name, value)?;
    }
    info!("Synced {} variables to {}", vars.len(), store.name());
    Ok(vars.len())
}

/// Put `dir` in front of the store's PATH unless already present.
///
/// Returns whether PATH changed.
pub fn prepend_user_path(store: &dyn UserEnvironment, dir: &Path) -> Result<bool, EnvError> {
    if !store.is_supported() {
        return Ok(false);
    }

    let dir = dir.to_string_lossy();
    let separator = store.path_separator();
    let current = store.get("PATH")?.unwrap_or_default();

    let present = current.split(separator).any(|entry| {
        let entry = entry.trim_end_matches(['/', '\\']);
        let dir = dir.trim_end_matches(['/', '\\']);
        if separator == ';' {
            entry.eq_ignore_ascii_case(dir)
        } else {
            entry == dir
        }
    });
    if present {
        debug!("{} already on {} PATH", dir, store.name());
        return Ok(false);
    }

    let updated = if current.is_empty() {
        dir.to_string()
    } else {
        format!("{}{}{}", dir, separator, current)
    };
    store.set("PATH", &updated)?;
    info!("Added {} to {} PATH", dir, store.name());
    Ok(true)
}
