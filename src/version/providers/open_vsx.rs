//! Open VSX marketplace lookup for editor extensions

use serde::Deserialize;
use tracing::warn;

use crate::version::error::ProviderError;
use crate::version::provider::LatestVersionProvider;
use crate::version::providers::npm::http_client;

#[derive(Debug, Deserialize)]
struct ExtensionResponse {
    #[serde(default)]
    version: String,
}

/// Latest-version provider for one extension on Open VSX
pub struct OpenVsxRegistry {
    client: reqwest::Client,
    base_url: String,
    publisher: String,
    name: String,
}

impl OpenVsxRegistry {
    pub fn new(base_url: &str, publisher: &str, name: &str) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            publisher: publisher.to_string(),
            name: name.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl LatestVersionProvider for OpenVsxRegistry {
    async fn latest_version(&self) -> Result<String, ProviderError> {
        let url = format!(
            "{}/api/{}/{}/latest",
            self.base_url, self.publisher, self.name
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(format!(
                "{}.{}",
                self.publisher, self.name
            )));
        }

        if !status.is_success() {
            warn!("Open VSX returned status {}: {}", status, url);
            return Err(ProviderError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        let extension: ExtensionResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse Open VSX response: {}", e);
            ProviderError::InvalidResponse(e.to_string())
        })?;

        if extension.version.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "Missing version field".to_string(),
            ));
        }
        Ok(extension.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn latest_version_reads_version_field() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/api/anthropic/claude-code/latest")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{ "namespace": "anthropic", "name": "claude-code", "version": "1.0.20" }"#,
            )
            .create_async()
            .await;

        let registry = OpenVsxRegistry::new(&server.url(), "anthropic", "claude-code");
        let result = registry.latest_version().await.unwrap();

        mock.assert_async().await;
        assert_eq!(result, "1.0.20");
    }

    #[tokio::test]
    async fn latest_version_returns_not_found_for_unknown_extension() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/api/nobody/nothing/latest")
            .with_status(404)
            .create_async()
            .await;

        let registry = OpenVsxRegistry::new(&server.url(), "nobody", "nothing");
        let result = registry.latest_version().await;

        mock.assert_async().await;
        assert!(matches!(result, Err(ProviderError::NotFound(_))));
    }

    #[tokio::test]
    async fn latest_version_rejects_payload_without_version() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/api/anthropic/claude-code/latest")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{ "name": "claude-code" }"#)
            .create_async()
            .await;

        let registry = OpenVsxRegistry::new(&server.url(), "anthropic", "claude-code");
        let result = registry.latest_version().await;

        mock.assert_async().await;
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }
}
