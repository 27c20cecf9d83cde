//! Hand-written providers that count their invocations

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use ccui_state::version::cache::{CacheOptions, VersionCache};
use ccui_state::version::error::ProviderError;
use ccui_state::version::provider::{LatestVersionProvider, LocalVersionProvider};
use ccui_state::version::resolver::ComponentResolver;
use ccui_state::version::types::Component;

/// Provider answering both sides with fixed values after an optional delay
pub struct CountingProvider {
    version: Option<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl CountingProvider {
    pub fn new(version: &str) -> Arc<Self> {
        Self::build(Some(version), Duration::ZERO)
    }

    pub fn slow(version: &str, delay: Duration) -> Arc<Self> {
        Self::build(Some(version), delay)
    }

    /// Provider whose every call fails
    pub fn failing() -> Arc<Self> {
        Self::build(None, Duration::ZERO)
    }

    fn build(version: Option<&str>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            version: version.map(str::to_string),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(&self) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.version
            .clone()
            .ok_or_else(|| ProviderError::InvalidResponse("stub failure".to_string()))
    }
}

#[async_trait]
impl LocalVersionProvider for CountingProvider {
    async fn local_version(&self) -> Result<String, ProviderError> {
        self.answer().await
    }
}

#[async_trait]
impl LatestVersionProvider for CountingProvider {
    async fn latest_version(&self) -> Result<String, ProviderError> {
        self.answer().await
    }
}

pub fn test_options(ttl: Duration) -> CacheOptions {
    CacheOptions {
        ttl,
        fetch_timeout: Duration::from_secs(5),
        check_timeout: Duration::from_secs(5),
        background_refresh: true,
    }
}

/// Cache tracking only the CLI component with the given providers
pub fn create_test_cache(
    local: Arc<CountingProvider>,
    remote: Arc<CountingProvider>,
    options: CacheOptions,
) -> VersionCache {
    let mut resolvers = HashMap::new();
    resolvers.insert(Component::Cli, ComponentResolver::new(local, remote));
    VersionCache::new(resolvers, options)
}
