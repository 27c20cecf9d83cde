//! Periodic refresh of every tracked component

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, sleep};
use tracing::{debug, info};

use crate::config::FETCH_STAGGER_DELAY_MS;
use crate::version::cache::VersionCache;

/// Refresh every tracked component.
///
/// Refreshes run in parallel with staggered start times. A component whose refresh
/// is already in flight is skipped. Returns how many components were refreshed.
pub async fn refresh_all(cache: &VersionCache) -> usize {
    let futures = cache
        .components()
        .into_iter()
        .enumerate()
        .map(|(i, component)| {
            let delay = Duration::from_millis(FETCH_STAGGER_DELAY_MS * i as u64);
            async move {
                sleep(delay).await;
                cache.refresh(component).await.is_some()
            }
        });

    let refreshed = join_all(futures)
        .await
        .into_iter()
        .filter(|done| *done)
        .count();
    debug!("Refreshed {} components", refreshed);
    refreshed
}

/// Handle to a running refresh loop
///
/// Dropping the handle also stops the loop at its next wake-up.
pub struct RefreshHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Stop the loop and wait for it to exit. An in-flight cycle is abandoned.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn the refresh loop; the first cycle starts immediately.
///
/// Must be called from within a tokio runtime.
pub(crate) fn spawn_refresh_loop(cache: Arc<VersionCache>, interval: Duration) -> RefreshHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = refresh_all(&cache) => {}
            }
        }

        info!("Background refresh stopped");
    });

    RefreshHandle { shutdown, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::cache::CacheOptions;
    use crate::version::provider::{MockLatestVersionProvider, MockLocalVersionProvider};
    use crate::version::resolver::ComponentResolver;
    use crate::version::types::{Component, StatusSource};
    use std::collections::HashMap;
    use std::ops::RangeInclusive;

    fn resolver(calls: RangeInclusive<usize>) -> ComponentResolver {
        let mut local = MockLocalVersionProvider::new();
        local
            .expect_local_version()
            .times(calls.clone())
            .returning(|| Ok("1.0.0".to_string()));
        let mut remote = MockLatestVersionProvider::new();
        remote
            .expect_latest_version()
            .times(calls)
            .returning(|| Ok("1.0.1".to_string()));
        ComponentResolver::new(Arc::new(local), Arc::new(remote))
    }

    fn create_cache(calls: RangeInclusive<usize>) -> Arc<VersionCache> {
        let mut resolvers = HashMap::new();
        resolvers.insert(Component::Cli, resolver(calls.clone()));
        resolvers.insert(Component::EditorExtension, resolver(calls));
        Arc::new(VersionCache::new(resolvers, CacheOptions::default()))
    }

    #[tokio::test]
    async fn refresh_all_refreshes_every_component() {
        let cache = create_cache(1..=1);

        let refreshed = refresh_all(&cache).await;

        assert_eq!(refreshed, 2);
        for component in Component::ALL {
            assert_eq!(
                cache.entry(component).unwrap().status.source,
                StatusSource::Live
            );
        }
    }

    #[tokio::test]
    async fn refresh_all_handles_empty_cache() {
        let cache = VersionCache::new(HashMap::new(), CacheOptions::default());
        assert_eq!(refresh_all(&cache).await, 0);
    }

    #[tokio::test]
    async fn background_refresh_runs_first_cycle_and_shuts_down() {
        let cache = create_cache(1..=1);

        let handle = cache
            .start_background_refresh(Duration::from_secs(3600))
            .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while cache.entry(Component::EditorExtension).is_none()
            || cache.entry(Component::Cli).is_none()
        {
            assert!(tokio::time::Instant::now() < deadline, "no refresh cycle ran");
            sleep(Duration::from_millis(10)).await;
        }

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn background_refresh_starts_only_once() {
        // Shutdown may abandon the first cycle before it reaches the providers
        let cache = create_cache(0..=1);

        let first = cache.start_background_refresh(Duration::from_secs(3600));
        let second = cache.start_background_refresh(Duration::from_secs(3600));

        assert!(first.is_some());
        assert!(second.is_none());

        first.unwrap().shutdown().await;
        cache.wait_idle(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn background_refresh_respects_disabled_setting() {
        let mut resolvers = HashMap::new();
        resolvers.insert(Component::Cli, resolver(0..=0));
        let cache = Arc::new(VersionCache::new(
            resolvers,
            CacheOptions {
                background_refresh: false,
                ..CacheOptions::default()
            },
        ));

        assert!(cache.start_background_refresh(Duration::from_secs(1)).is_none());
    }
}
