//! `ccui` launcher script: loads the env file, then runs the CLI

use std::path::{Path, PathBuf};

use tracing::info;

use crate::env::error::EnvError;
use crate::fs::atomic_write;

/// Directory the launcher goes to when none is given
pub fn default_launcher_dir() -> PathBuf {
    launcher_dir_with_home(dirs::home_dir())
}

fn launcher_dir_with_home(home_dir: Option<PathBuf>) -> PathBuf {
    let home = home_dir.unwrap_or_else(|| PathBuf::from("."));
    if cfg!(windows) {
        home.join("AppData").join("Roaming").join("npm")
    } else {
        home.join(".local").join("bin")
    }
}

fn single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

pub(crate) fn launcher_file_name(windows: bool) -> &'static str {
    if windows { "ccui.bat" } else { "ccui" }
}

/// Script text for a POSIX shell or for cmd.exe
pub fn launcher_script(env_file: &Path, cli_command: &str, windows: bool) -> String {
    if windows {
        format!(
            "@echo off\r\n\
             if exist \"{env}\" (\r\n    call \"{env}\"\r\n)\r\n\
             {cli} %*\r\n",
            env = env_file.display(),
            cli = cli_command,
        )
    } else {
        format!(
            "#!/bin/sh\n\
             set -eu\n\
             ENV_FILE=\"${{CLAUDE_ENV_FILE:-}}\"\n\
             if [ -z \"$ENV_FILE\" ]; then\n  ENV_FILE={env}\nfi\n\
             if [ -f \"$ENV_FILE\" ]; then\n  . \"$ENV_FILE\"\nfi\n\
             exec {cli} \"$@\"\n",
            env = single_quote(&env_file.to_string_lossy()),
            cli = single_quote(cli_command),
        )
    }
}

/// Write the launcher into `dir`, creating it if needed. Returns the script path.
pub fn install_launcher(
    dir: &Path,
    env_file: &Path,
    cli_command: &str,
) -> Result<PathBuf, EnvError> {
    std::fs::create_dir_all(dir).map_err(EnvError::not_writable(dir))?;

    let windows = cfg!(windows);
    let path = dir.join(launcher_file_name(windows));
    let script = launcher_script(env_file, cli_command, windows);
    atomic_write(&path, script.as_bytes()).map_err(EnvError::not_writable(&path))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .map_err(EnvError::not_writable(&path))?;
    }

    info!("Installed launcher at {:?}", path);
    Ok(path)
}
