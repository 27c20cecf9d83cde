//! Provider traits for obtaining raw version strings

#[cfg(test)]
use mockall::automock;

use crate::version::error::ProviderError;

/// Reports the version installed on this machine
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait LocalVersionProvider: Send + Sync {
    /// Returns the raw version text, e.g. the output of `claude --version`
    async fn local_version(&self) -> Result<String, ProviderError>;
}

/// Reports the newest published version
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait LatestVersionProvider: Send + Sync {
    /// Returns the raw version string of the latest release
    async fn latest_version(&self) -> Result<String, ProviderError>;
}
