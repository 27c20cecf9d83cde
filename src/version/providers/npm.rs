//! npm registry "latest" dist-tag lookup

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::config::FETCH_TIMEOUT_MS;
use crate::version::error::ProviderError;
use crate::version::provider::LatestVersionProvider;

/// Response from npm registry API (only the fields we read)
#[derive(Debug, Deserialize)]
struct NpmPackageResponse {
    #[serde(rename = "dist-tags", default)]
    dist_tags: HashMap<String, String>,
}

/// Latest-version provider backed by the npm registry
#[derive(Clone)]
pub struct NpmRegistry {
    client: reqwest::Client,
    base_url: String,
    package_name: String,
}

impl NpmRegistry {
    /// Creates a provider for `package_name` against a custom registry URL
    pub fn new(base_url: &str, package_name: &str) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            package_name: package_name.to_string(),
        }
    }

    /// Encode package name for URL (handles scoped packages)
    fn encode_package_name(package_name: &str) -> String {
        if package_name.starts_with('@') {
            // Scoped package: @scope/name -> @scope%2Fname
            package_name.replace('/', "%2F")
        } else {
            package_name.to_string()
        }
    }
}

/// HTTP client shared by the registry providers
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("ccui-state/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_millis(FETCH_TIMEOUT_MS))
        .build()
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl LatestVersionProvider for NpmRegistry {
    async fn latest_version(&self) -> Result<String, ProviderError> {
        let url = format!(
            "{}/{}",
            self.base_url,
            Self::encode_package_name(&self.package_name)
        );

        let response = self.client.get(&url).send().await?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(self.package_name.clone()));
        }

        if !status.is_success() {
            warn!("npm registry returned status {}: {}", status, url);
            return Err(ProviderError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        let package_info: NpmPackageResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse npm registry response: {}", e);
            ProviderError::InvalidResponse(e.to_string())
        })?;

        package_info
            .dist_tags
            .get("latest")
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| {
                ProviderError::InvalidResponse(format!(
                    "No latest dist-tag for {}",
                    self.package_name
                ))
            })
    }
}
