//! Read-only health check of the targets the environment writer manages

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::config::{ENV_AUTH_TOKEN, ENV_BASE_URL};
use crate::env::error::EnvError;
use crate::env::file::EnvFileFormat;
use crate::env::launcher::{launcher_file_name, launcher_script};

/// Variables an account env file must define
pub const REQUIRED_VARS: [&str; 2] = [ENV_BASE_URL, ENV_AUTH_TOKEN];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvFileCheck {
    pub path: PathBuf,
    pub exists: bool,
    /// Required variables without an assignment in the file
    pub missing_vars: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LauncherCheck {
    /// Where the launcher is expected
    pub path: PathBuf,
    pub installed: bool,
    /// Installed script matches what `install_launcher` would write now
    pub up_to_date: bool,
    /// First launcher found through PATH
    pub found_on_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinDirCheck {
    pub path: PathBuf,
    pub on_path: bool,
}

/// Installed CLI and where it was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CliCheck {
    pub command: String,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvCheckReport {
    pub env_file: EnvFileCheck,
    pub launcher: LauncherCheck,
    pub bin_dir: BinDirCheck,
    pub cli: CliCheck,
}

impl EnvCheckReport {
    /// Human-readable problems, empty when everything is in place
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.env_file.exists {
            issues.push(format!("Env file {} does not exist", self.env_file.path.display()));
        } else if !self.env_file.missing_vars.is_empty() {
            issues.push(format!(
                "Env file {} does not set {}",
                self.env_file.path.display(),
                self.env_file.missing_vars.join(", ")
            ));
        }

        if !self.launcher.installed {
            issues.push(format!(
                "Launcher is not installed at {}",
                self.launcher.path.display()
            ));
        } else if !self.launcher.up_to_date {
            issues.push(format!(
                "Launcher at {} is outdated",
                self.launcher.path.display()
            ));
        }
        if self.launcher.installed && self.launcher.found_on_path.is_none() {
            issues.push("Launcher is not reachable through PATH".to_string());
        }

        if !self.bin_dir.on_path {
            issues.push(format!("{} is not on PATH", self.bin_dir.path.display()));
        }

        if self.cli.path.is_none() {
            issues.push(format!("{} is not installed", self.cli.command));
        }

        issues
    }

    pub fn is_healthy(&self) -> bool {
        self.issues().is_empty()
    }
}

/// Inputs of [`check_environment`]
#[derive(Debug, Clone)]
pub struct CheckTargets<'a> {
    pub env_file: &'a Path,
    pub launcher_dir: &'a Path,
    pub cli_command: &'a str,
    /// Value of PATH to check against
    pub path_var: Option<&'a OsStr>,
    /// Resolved CLI location, see [`crate::process::find_command`]
    pub cli_path: Option<PathBuf>,
}

/// Inspect the env file, launcher and PATH without changing anything.
pub fn check_environment(targets: &CheckTargets<'_>) -> Result<EnvCheckReport, EnvError> {
    let windows = cfg!(windows);

    let env_file = check_env_file(targets.env_file)?;

    let launcher_path = targets.launcher_dir.join(launcher_file_name(windows));
    let expected = launcher_script(targets.env_file, targets.cli_command, windows);
    let installed_script = read_optional(&launcher_path)?;
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let found_on_path = which::which_in(launcher_file_name(windows), targets.path_var, &cwd).ok();

    let on_path = targets.path_var.is_some_and(|value| {
        std::env::split_paths(value).any(|dir| same_dir(&dir, targets.launcher_dir))
    });

    let report = EnvCheckReport {
        env_file,
        launcher: LauncherCheck {
            path: launcher_path,
            installed: installed_script.is_some(),
            up_to_date: installed_script.as_deref() == Some(expected.as_str()),
            found_on_path,
        },
        bin_dir: BinDirCheck {
            path: targets.launcher_dir.to_path_buf(),
            on_path,
        },
        cli: CliCheck {
            command: targets.cli_command.to_string(),
            path: targets.cli_path.clone(),
        },
    };
    debug!("Environment check: {:?}", report);
    Ok(report)
}

fn check_env_file(path: &Path) -> Result<EnvFileCheck, EnvError> {
    let content = read_optional(path)?;
    let format = EnvFileFormat::for_path(path);

    let missing_vars = match &content {
        Some(content) => REQUIRED_VARS
            .into_iter()
            .filter(|name| !content.lines().any(|line| assigns(line, name, format)))
            .collect(),
        None => REQUIRED_VARS.to_vec(),
    };

    Ok(EnvFileCheck {
        path: path.to_path_buf(),
        exists: content.is_some(),
        missing_vars,
    })
}

fn assigns(line: &str, name: &str, format: EnvFileFormat) -> bool {
    let line = line.trim();
    let rest = match format {
        EnvFileFormat::Posix => line.strip_prefix("export "),
        EnvFileFormat::Batch => line
            .strip_prefix("set \"")
            .or_else(|| line.strip_prefix("set ")),
    };
    rest.and_then(|rest| rest.trim_start().strip_prefix(name))
        .is_some_and(|rest| rest.starts_with('='))
}

fn read_optional(path: &Path) -> Result<Option<String>, EnvError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(EnvError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    let trim = |p: &Path| {
        let s = p.to_string_lossy();
        s.trim_end_matches(['/', '\\']).to_string()
    };
    if cfg!(windows) {
        trim(a).eq_ignore_ascii_case(&trim(b))
    } else {
        trim(a) == trim(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::file::{EnvVarSet, write_env_file};
    use crate::env::launcher::install_launcher;
    use rstest::rstest;
    use std::ffi::OsString;
    use tempfile::TempDir;

    struct Fixture {
        temp_dir: TempDir,
        env_file: PathBuf,
        bin_dir: PathBuf,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let env_file = temp_dir.path().join(".claude-code-env");
        let bin_dir = temp_dir.path().join("bin");
        Fixture {
            temp_dir,
            env_file,
            bin_dir,
        }
    }

    fn targets<'a>(fixture: &'a Fixture, path_var: Option<&'a OsStr>) -> CheckTargets<'a> {
        CheckTargets {
            env_file: &fixture.env_file,
            launcher_dir: &fixture.bin_dir,
            cli_command: "claude",
            path_var,
            cli_path: Some(PathBuf::from("/usr/local/bin/claude")),
        }
    }

    #[test]
    fn empty_environment_reports_every_target() {
        let fixture = fixture();

        let report = check_environment(&targets(&fixture, None)).unwrap();

        assert!(!report.env_file.exists);
        assert_eq!(report.env_file.missing_vars, REQUIRED_VARS.to_vec());
        assert!(!report.launcher.installed);
        assert!(!report.bin_dir.on_path);
        assert_eq!(report.issues().len(), 3);
        assert!(!report.is_healthy());
    }

    #[cfg(unix)]
    #[test]
    fn configured_environment_is_healthy() {
        let fixture = fixture();
        let vars = EnvVarSet::for_account("https://api.example.com", "sk-1").unwrap();
        write_env_file(&fixture.env_file, &vars).unwrap();
        install_launcher(&fixture.bin_dir, &fixture.env_file, "claude").unwrap();
        let path_var = std::env::join_paths([fixture.bin_dir.clone()]).unwrap();

        let report = check_environment(&targets(&fixture, Some(path_var.as_os_str()))).unwrap();

        assert!(report.env_file.missing_vars.is_empty());
        assert!(report.launcher.up_to_date);
        assert_eq!(
            report.launcher.found_on_path,
            Some(fixture.bin_dir.join("ccui"))
        );
        assert!(report.bin_dir.on_path);
        assert_eq!(report.issues(), Vec::<String>::new());
    }

    #[test]
    fn env_file_missing_a_variable_is_reported() {
        let fixture = fixture();
        std::fs::write(
            &fixture.env_file,
            "export ANTHROPIC_BASE_URL=\"https://api.example.com\"\n\
             # export ANTHROPIC_AUTH_TOKEN=\"old\"\n",
        )
        .unwrap();

        let report = check_environment(&targets(&fixture, None)).unwrap();

        assert!(report.env_file.exists);
        assert_eq!(report.env_file.missing_vars, vec![ENV_AUTH_TOKEN]);
    }

    #[test]
    fn launcher_for_another_cli_is_outdated() {
        let fixture = fixture();
        install_launcher(&fixture.bin_dir, &fixture.env_file, "claude-code").unwrap();

        let report = check_environment(&targets(&fixture, None)).unwrap();

        assert!(report.launcher.installed);
        assert!(!report.launcher.up_to_date);
    }

    #[test]
    fn missing_cli_is_an_issue() {
        let fixture = fixture();
        let mut check = targets(&fixture, None);
        check.cli_path = None;

        let report = check_environment(&check).unwrap();

        assert!(report.issues().iter().any(|issue| issue == "claude is not installed"));
    }

    #[test]
    fn bin_dir_with_trailing_separator_counts_as_on_path() {
        let fixture = fixture();
        let mut entry = OsString::from(fixture.bin_dir.as_os_str());
        entry.push("/");
        let other = fixture.temp_dir.path().join("other");
        let path_var = std::env::join_paths([other, PathBuf::from(entry)]).unwrap();

        let report = check_environment(&targets(&fixture, Some(path_var.as_os_str()))).unwrap();

        assert!(report.bin_dir.on_path);
    }

    #[rstest]
    #[case::posix("export ANTHROPIC_BASE_URL=\"x\"", EnvFileFormat::Posix, true)]
    #[case::posix_prefix_only("export ANTHROPIC_BASE_URL_OLD=\"x\"", EnvFileFormat::Posix, false)]
    #[case::posix_commented("# export ANTHROPIC_BASE_URL=\"x\"", EnvFileFormat::Posix, false)]
    #[case::batch_quoted("set \"ANTHROPIC_BASE_URL=x\"", EnvFileFormat::Batch, true)]
    #[case::batch_plain("set ANTHROPIC_BASE_URL=x", EnvFileFormat::Batch, true)]
    #[case::batch_rem("rem set \"ANTHROPIC_BASE_URL=x\"", EnvFileFormat::Batch, false)]
    fn assigns_cases(#[case] line: &str, #[case] format: EnvFileFormat, #[case] expected: bool) {
        assert_eq!(assigns(line, ENV_BASE_URL, format), expected);
    }
}
