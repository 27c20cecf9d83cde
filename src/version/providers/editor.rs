//! Installed editor extension version, read from the editor's extension listing

use std::time::Duration;

use crate::config::FETCH_TIMEOUT_MS;
use crate::process::{self, ProcessError};
use crate::version::error::ProviderError;
use crate::version::provider::LocalVersionProvider;

/// Extension ids in order of preference
pub const EXTENSION_IDS: &[&str] = &["anthropic.claude-code", "anthropic.claude"];

/// Local provider backed by `code --list-extensions --show-versions`
pub struct EditorExtensionProvider {
    editor_command: String,
    extension_ids: Vec<String>,
    timeout: Duration,
}

impl EditorExtensionProvider {
    pub fn new(editor_command: &str) -> Self {
        Self {
            editor_command: editor_command.to_string(),
            extension_ids: EXTENSION_IDS.iter().map(|id| id.to_string()).collect(),
            timeout: Duration::from_millis(FETCH_TIMEOUT_MS),
        }
    }
}

/// Find the version of the first preferred extension in a `id@version` listing
pub fn find_extension_version(listing: &str, extension_ids: &[String]) -> Option<String> {
    extension_ids.iter().find_map(|id| {
        listing.lines().find_map(|line| {
            let (line_id, version) = line.trim().split_once('@')?;
            (line_id.eq_ignore_ascii_case(id) && !version.is_empty())
                .then(|| version.to_string())
        })
    })
}

#[async_trait::async_trait]
impl LocalVersionProvider for EditorExtensionProvider {
    async fn local_version(&self) -> Result<String, ProviderError> {
        let output = process::run(
            &self.editor_command,
            &["--list-extensions", "--show-versions"],
            self.timeout,
        )
        .await
        .map_err(|e| match e {
            ProcessError::NotFound { program } => ProviderError::NotInstalled(program),
            other => other.into(),
        })?;

        if !output.success() {
            return Err(ProviderError::InvalidResponse(format!(
                "{} exited with {:?}",
                self.editor_command, output.code
            )));
        }

        find_extension_version(&output.stdout, &self.extension_ids)
            .ok_or_else(|| ProviderError::NotInstalled(self.extension_ids.join(" / ")))
    }
}
