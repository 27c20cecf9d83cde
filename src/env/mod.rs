//! Persistence of account environment variables
//!
//! Three targets make the selected account visible to later sessions:
//!
//! - the generated env file, owned by this tool and regenerated on every write
//! - a managed PATH line in the user's shell profiles
//! - the OS user environment store, for applications not started from a shell
//!
//! Every operation is idempotent, so a failed call can simply be retried.
//! [`check_environment`] reports the state of all three without writing.

pub mod check;
pub mod error;
pub mod file;
pub mod launcher;
pub mod profile;
pub mod user_store;

use std::path::{Path, PathBuf};

use tracing::info;

pub use check::{CheckTargets, EnvCheckReport, check_environment};
pub use error::EnvError;
pub use file::{EnvFileFormat, EnvVarSet, write_env_file};
pub use launcher::{default_launcher_dir, install_launcher};
pub use profile::{PATH_MARKER, PathReport, ensure_bin_on_path, merge_shell_profile_line};
pub use user_store::{UserEnvironment, platform_store, sync_user_environment};

/// What [`apply_account`] wrote
#[derive(Debug, PartialEq, Eq)]
pub struct ApplyReport {
    pub env_file: PathBuf,
    /// Name of the user environment store, `None` when the platform has none
    pub user_store: Option<&'static str>,
    pub synced: usize,
}

/// Make `vars` the active account environment.
///
/// The env file is written first; the user environment store is only touched once
/// that write is durable.
pub fn apply_account(
    env_file: &Path,
    vars: &EnvVarSet,
    store: &dyn UserEnvironment,
) -> Result<ApplyReport, EnvError> {
    write_env_file(env_file, vars)?;
    let synced = sync_user_environment(store, vars)?;

    info!("Applied account environment ({} variables)", vars.len());
    Ok(ApplyReport {
        env_file: env_file.to_path_buf(),
        user_store: store.is_supported().then(|| store.name()),
        synced,
    })
}

/// Mask all but the last `keep` characters of a secret for display
pub fn mask_secret(value: &str, keep: usize) -> String {
    let len = value.chars().count();
    if len <= keep {
        return "*".repeat(len);
    }
    let tail: String = value.chars().skip(len - keep).collect();
    format!("{}{}", "*".repeat(len - keep), tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::user_store::{MockUserEnvironment, NoopUserEnvironment};
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("", 4, "")]
    #[case("abc", 4, "***")]
    #[case("abcd", 4, "****")]
    #[case("sk-ant-123456", 4, "*********3456")]
    #[case("sk-ant-123456", 0, "*************")]
    #[case("ключ-секрет", 2, "*********ет")]
    fn mask_secret_cases(#[case] value: &str, #[case] keep: usize, #[case] expected: &str) {
        assert_eq!(mask_secret(value, keep), expected);
    }

    #[test]
    fn apply_account_writes_env_file_without_store() {
        let temp_dir = TempDir::new().unwrap();
        let env_file = temp_dir.path().join(".claude-code-env");
        let vars = EnvVarSet::for_account("https://api.example.com", "sk-1").unwrap();

        let report = apply_account(&env_file, &vars, &NoopUserEnvironment).unwrap();

        assert_eq!(
            report,
            ApplyReport {
                env_file: env_file.clone(),
                user_store: None,
                synced: 0,
            }
        );
        assert!(
            std::fs::read_to_string(&env_file)
                .unwrap()
                .contains("export ANTHROPIC_AUTH_TOKEN=\"sk-1\"")
        );
    }

    #[test]
    fn apply_account_does_not_touch_store_when_env_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let env_file = temp_dir.path().join("missing").join(".claude-code-env");
        let vars = EnvVarSet::for_account("https://api.example.com", "sk-1").unwrap();

        let mut store = MockUserEnvironment::new();
        store.expect_set().times(0);
        store.expect_is_supported().return_const(true);

        let result = apply_account(&env_file, &vars, &store);
        assert!(matches!(result, Err(EnvError::NotWritable { .. })));
    }

    #[test]
    fn apply_account_syncs_supported_store() {
        let temp_dir = TempDir::new().unwrap();
        let env_file = temp_dir.path().join(".claude-code-env");
        let vars = EnvVarSet::for_account("https://api.example.com", "sk-1").unwrap();

        let mut store = MockUserEnvironment::new();
        store.expect_is_supported().return_const(true);
        store.expect_name().return_const("launchctl");
        store.expect_set().times(2).returning(|_, _| Ok(()));

        let report = apply_account(&env_file, &vars, &store).unwrap();

        assert_eq!(report.user_store, Some("launchctl"));
        assert_eq!(report.synced, 2);
    }
}
