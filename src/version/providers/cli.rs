//! Installed CLI version, read from `<cli> --version`

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::config::FETCH_TIMEOUT_MS;
use crate::process::{self, ProcessError};
use crate::version::error::ProviderError;
use crate::version::provider::LocalVersionProvider;

/// Local provider that asks the CLI binary for its version
///
/// Tries several invocations in order; the first one that exits successfully with
/// output wins.
pub struct CliVersionProvider {
    invocations: Vec<(String, Vec<String>)>,
    timeout: Duration,
}

impl CliVersionProvider {
    /// Provider for `command`, also trying its resolved location outside PATH
    pub fn new(command: &str) -> Self {
        Self::with_resolved(command, process::find_command(command))
    }

    /// Provider that tries `resolved` before the bare command names
    pub fn with_resolved(command: &str, resolved: Option<PathBuf>) -> Self {
        let mut invocations = Vec::new();
        if let Some(path) = resolved.filter(|path| path.as_os_str() != command) {
            debug!("Resolved {} to {:?}", command, path);
            invocations.push((
                path.to_string_lossy().into_owned(),
                vec!["--version".to_string()],
            ));
        }
        if cfg!(windows) {
            invocations.push((format!("{}.cmd", command), vec!["--version".to_string()]));
        }
        invocations.push((command.to_string(), vec!["--version".to_string()]));
        invocations.push((command.to_string(), vec!["-v".to_string()]));
        if command == "claude" {
            invocations.push(("claude-code".to_string(), vec!["--version".to_string()]));
        }

        Self {
            invocations,
            timeout: Duration::from_millis(FETCH_TIMEOUT_MS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl LocalVersionProvider for CliVersionProvider {
    async fn local_version(&self) -> Result<String, ProviderError> {
        let mut last_error: Option<ProcessError> = None;

        for (program, args) in &self.invocations {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            match process::run(program, &args, self.timeout).await {
                Ok(output) if output.success() && !output.stdout.is_empty() => {
                    return Ok(output.stdout);
                }
                Ok(output) => {
                    debug!(
                        "{} {:?} exited with {:?}: {}",
                        program, args, output.code, output.stderr
                    );
                }
                Err(e) => {
                    debug!("{} {:?} failed: {}", program, args, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(ProcessError::NotFound { program }) => Err(ProviderError::NotInstalled(program)),
            Some(e) => Err(e.into()),
            None => Err(ProviderError::InvalidResponse(
                "CLI produced no version output".to_string(),
            )),
        }
    }
}
