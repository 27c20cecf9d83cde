//! External command execution with captured output
//!
//! Every call that can wait on another process is bounded by a timeout; the child is
//! killed when the timeout fires.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Command not found: {program}")]
    NotFound { program: String },

    #[error("Failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    fn from_std(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}

fn spawn_error(program: &str, source: std::io::Error) -> ProcessError {
    if source.kind() == std::io::ErrorKind::NotFound {
        ProcessError::NotFound {
            program: program.to_string(),
        }
    } else {
        ProcessError::Io {
            program: program.to_string(),
            source,
        }
    }
}

/// Run `program args...` asynchronously, killing it after `timeout`.
pub async fn run(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput, ProcessError> {
    debug!("Running {} {:?}", program, args);

    let child = Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::null())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => Ok(CommandOutput::from_std(output)),
        Ok(Err(e)) => Err(spawn_error(program, e)),
        Err(_) => Err(ProcessError::Timeout {
            program: program.to_string(),
            timeout,
        }),
    }
}

/// Run `program args...` on the current thread.
///
/// Used by synchronous operations that call short-lived system tools.
pub fn run_blocking(program: &str, args: &[&str]) -> Result<CommandOutput, ProcessError> {
    debug!("Running {} {:?}", program, args);

    std::process::Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::null())
        .output()
        .map(CommandOutput::from_std)
        .map_err(|e| spawn_error(program, e))
}

/// Install directories searched when a command is not on PATH
pub fn fallback_command_dirs(home_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if cfg!(windows) {
        if let Some(home) = home_dir {
            dirs.push(home.join("AppData").join("Roaming").join("npm"));
            dirs.push(home.join("AppData").join("Local").join("npm"));
        }
        dirs.push(PathBuf::from(r"C:\Program Files\nodejs"));
        dirs.push(PathBuf::from(r"C:\Program Files (x86)\nodejs"));
    } else {
        if let Some(home) = home_dir {
            dirs.push(home.join(".local").join("bin"));
            dirs.push(home.join("bin"));
        }
        dirs.push(PathBuf::from("/usr/local/bin"));
        dirs.push(PathBuf::from("/usr/bin"));
        dirs.push(PathBuf::from("/opt/homebrew/bin"));
    }
    dirs
}

/// Locate `command` on this process's PATH, then in the usual install directories.
///
/// Processes started from a desktop session often get a minimal PATH that misses
/// user-level installs.
pub fn find_command(command: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH");
    let home_dir = dirs::home_dir();
    find_command_in(command, path_var.as_deref(), home_dir.as_deref())
}

/// [`find_command`] with an explicit PATH value and home directory
pub fn find_command_in(
    command: &str,
    path_var: Option<&OsStr>,
    home_dir: Option<&Path>,
) -> Option<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    if let Ok(found) = which::which_in(command, path_var, &cwd) {
        return Some(found);
    }

    let fallback = std::env::join_paths(fallback_command_dirs(home_dir)).ok()?;
    match which::which_in(command, Some(fallback), &cwd) {
        Ok(found) => {
            debug!("Found {} outside PATH at {:?}", command, found);
            Some(found)
        }
        Err(_) => None,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn install_tool(dir: &Path, name: &str) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\necho ok\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn find_command_in_searches_home_install_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let home = temp_dir.path().join("home");
        let tool = install_tool(&home.join(".local").join("bin"), "ccui-test-cli");
        let empty_path = temp_dir.path().join("empty");
        std::fs::create_dir(&empty_path).unwrap();

        let found = find_command_in("ccui-test-cli", Some(empty_path.as_os_str()), Some(&home));

        assert_eq!(found, Some(tool));
    }

    #[test]
    fn find_command_in_prefers_path_entries() {
        let temp_dir = TempDir::new().unwrap();
        let home = temp_dir.path().join("home");
        install_tool(&home.join("bin"), "ccui-test-cli");
        let on_path = install_tool(&temp_dir.path().join("path"), "ccui-test-cli");

        let found = find_command_in(
            "ccui-test-cli",
            Some(temp_dir.path().join("path").as_os_str()),
            Some(&home),
        );

        assert_eq!(found, Some(on_path));
    }

    #[test]
    fn find_command_in_returns_none_when_missing() {
        let temp_dir = TempDir::new().unwrap();

        let found = find_command_in(
            "ccui-test-cli-missing",
            Some(temp_dir.path().as_os_str()),
            Some(temp_dir.path()),
        );

        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn run_captures_trimmed_stdout() {
        let output = run("sh", &["-c", "echo '1.2.3 (Claude Code)'"], Duration::from_secs(5))
            .await
            .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout, "1.2.3 (Claude Code)");
    }

    #[tokio::test]
    async fn run_reports_non_zero_exit() {
        let output = run("sh", &["-c", "echo oops >&2; exit 3"], Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!output.success());
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stderr, "oops");
    }

    #[tokio::test]
    async fn run_reports_missing_binary() {
        let result = run("definitely-not-a-real-binary-ccui", &[], Duration::from_secs(5)).await;

        assert!(matches!(result, Err(ProcessError::NotFound { .. })));
    }

    #[tokio::test]
    async fn run_times_out_long_running_commands() {
        let result = run("sleep", &["5"], Duration::from_millis(50)).await;

        assert!(matches!(result, Err(ProcessError::Timeout { .. })));
    }

    #[test]
    fn run_blocking_captures_output() {
        let output = run_blocking("sh", &["-c", "printf hello"]).unwrap();
        assert_eq!(output.stdout, "hello");
    }
}
