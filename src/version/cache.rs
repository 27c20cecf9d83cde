//! In-memory version status cache with TTL and non-blocking refresh
//!
//! Each tracked component owns a slot holding its entry, an in-flight flag and its
//! override values. The slot map is fixed at construction, so reads and refreshes of
//! different components never contend.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::{CHECK_TIMEOUT_MS, CacheSettings, ForcedStatus, OverrideSettings};
use crate::version::error::ProviderError;
use crate::version::refresh::{RefreshHandle, spawn_refresh_loop};
use crate::version::resolver::ComponentResolver;
use crate::version::semver::SemVer;
use crate::version::store::StatusStore;
use crate::version::types::{Component, StatusSource, VersionStatus};

/// Timing knobs for [`VersionCache`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Age after which an entry is stale
    pub ttl: Duration,
    /// Bound on each provider call
    pub fetch_timeout: Duration,
    /// Bound on an explicit [`VersionCache::check_now`]
    pub check_timeout: Duration,
    /// Whether [`VersionCache::start_background_refresh`] may start the timer loop
    pub background_refresh: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self::from(&CacheSettings::default())
    }
}

impl From<&CacheSettings> for CacheOptions {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            ttl: Duration::from_secs(settings.refresh_interval_secs),
            fetch_timeout: Duration::from_millis(settings.fetch_timeout_ms),
            check_timeout: Duration::from_millis(CHECK_TIMEOUT_MS),
            background_refresh: settings.background_refresh,
        }
    }
}

/// A status together with the moment it goes stale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub status: VersionStatus,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(status: VersionStatus, ttl: Duration) -> Self {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let expires_at = status
            .checked_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { status, expires_at }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

struct Slot {
    resolver: ComponentResolver,
    entry: RwLock<Option<CacheEntry>>,
    refreshing: AtomicBool,
    forced_latest: RwLock<Option<String>>,
    forced_status: RwLock<Option<VersionStatus>>,
}

impl Slot {
    fn new(resolver: ComponentResolver) -> Self {
        Self {
            resolver,
            entry: RwLock::new(None),
            refreshing: AtomicBool::new(false),
            forced_latest: RwLock::new(None),
            forced_status: RwLock::new(None),
        }
    }

    fn entry(&self) -> Option<CacheEntry> {
        self.entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_entry(&self, entry: CacheEntry) {
        *self.entry.write().unwrap_or_else(PoisonError::into_inner) = Some(entry);
    }

    fn forced_latest(&self) -> Option<String> {
        self.forced_latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn forced_status(&self) -> Option<VersionStatus> {
        self.forced_status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Marks a slot as "refresh in flight" until dropped
struct RefreshGuard {
    slot: Arc<Slot>,
}

impl RefreshGuard {
    fn try_acquire(slot: &Arc<Slot>) -> Option<Self> {
        slot.refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { slot: slot.clone() })
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.slot.refreshing.store(false, Ordering::Release);
    }
}

/// Cache of installed-vs-latest status per component
///
/// Construct once per process and share it through an `Arc`.
pub struct VersionCache {
    slots: BTreeMap<Component, Arc<Slot>>,
    options: CacheOptions,
    store: Option<Arc<dyn StatusStore>>,
    loop_started: AtomicBool,
}

impl VersionCache {
    pub fn new(resolvers: HashMap<Component, ComponentResolver>, options: CacheOptions) -> Self {
        let slots = resolvers
            .into_iter()
            .map(|(component, resolver)| (component, Arc::new(Slot::new(resolver))))
            .collect();

        Self {
            slots,
            options,
            store: None,
            loop_started: AtomicBool::new(false),
        }
    }

    /// Attach a persistent store and seed entries from it
    pub fn with_store(mut self, store: Arc<dyn StatusStore>) -> Self {
        match store.load_all() {
            Ok(statuses) => {
                for status in statuses {
                    if let Some(slot) = self.slots.get(&status.component) {
                        debug!("Seeded {} from status store", status.component);
                        slot.replace_entry(CacheEntry::new(status, self.options.ttl));
                    }
                }
            }
            Err(e) => error!("Failed to load stored statuses: {}", e),
        }
        self.store = Some(store);
        self
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Tracked components in a stable order
    pub fn components(&self) -> Vec<Component> {
        self.slots.keys().copied().collect()
    }

    /// Current entry for a component, fresh or not
    pub fn entry(&self, component: Component) -> Option<CacheEntry> {
        self.slots.get(&component).and_then(|slot| slot.entry())
    }

    /// Whether a refresh for the component is running
    pub fn is_refreshing(&self, component: Component) -> bool {
        self.slots
            .get(&component)
            .is_some_and(|slot| slot.refreshing.load(Ordering::Acquire))
    }

    /// Force the "latest" version of a component; `None` clears the override
    pub fn set_forced_latest(&self, component: Component, version: Option<String>) {
        if let Some(slot) = self.slots.get(&component) {
            *slot
                .forced_latest
                .write()
                .unwrap_or_else(PoisonError::into_inner) = version;
        }
    }

    /// Force the full status of a component; `None` clears the override.
    ///
    /// Takes precedence over a forced latest version.
    pub fn set_forced_status(&self, component: Component, status: Option<VersionStatus>) {
        if let Some(slot) = self.slots.get(&component) {
            *slot
                .forced_status
                .write()
                .unwrap_or_else(PoisonError::into_inner) = status;
        }
    }

    /// Install overrides from settings
    pub fn apply_overrides(&self, overrides: &OverrideSettings) {
        if let Some(latest) = &overrides.latest_version {
            info!("Forcing latest version {} for all components", latest);
            for component in self.components() {
                self.set_forced_latest(component, Some(latest.clone()));
            }
        }

        for (id, forced) in &overrides.status {
            let Ok(component) = id.parse::<Component>() else {
                warn!("Ignoring forced status for unknown component {:?}", id);
                continue;
            };
            self.set_forced_status(component, Some(forced_status(component, forced)));
        }
    }

    /// Return the latest known status without waiting.
    ///
    /// A missing or expired entry schedules a background refresh (at most one in
    /// flight per component) and the previous value, or a placeholder, is returned.
    pub fn get_status(self: &Arc<Self>, component: Component) -> VersionStatus {
        let Some(slot) = self.slots.get(&component) else {
            return VersionStatus::placeholder(component);
        };

        let (status, stale) = match slot.entry() {
            Some(entry) => {
                let stale = entry.is_expired(Utc::now());
                (entry.status, stale)
            }
            None => (VersionStatus::placeholder(component), true),
        };

        if stale {
            self.schedule_refresh(component, slot);
        }

        status
    }

    /// [`get_status`](Self::get_status) for every tracked component
    pub fn statuses(self: &Arc<Self>) -> Vec<VersionStatus> {
        self.components()
            .into_iter()
            .map(|component| self.get_status(component))
            .collect()
    }

    fn schedule_refresh(self: &Arc<Self>, component: Component, slot: &Arc<Slot>) {
        let Some(guard) = RefreshGuard::try_acquire(slot) else {
            debug!("Refresh for {} already in flight", component);
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Scheduling background refresh for {}", component);
                let cache = Arc::clone(self);
                handle.spawn(async move {
                    let slot = guard.slot.clone();
                    cache.fetch_and_store(component, &slot).await;
                    drop(guard);
                });
            }
            Err(_) => warn!(
                "No async runtime available, skipping refresh for {}",
                component
            ),
        }
    }

    /// Refresh one component unless a refresh is already in flight.
    ///
    /// Returns `None` when the component is untracked or already refreshing.
    pub async fn refresh(&self, component: Component) -> Option<VersionStatus> {
        let slot = self.slots.get(&component)?;
        let Some(guard) = RefreshGuard::try_acquire(slot) else {
            debug!("Refresh for {} already in flight", component);
            return None;
        };

        let status = self.fetch_and_store(component, slot).await;
        drop(guard);
        Some(status)
    }

    /// Fetch now regardless of TTL and of any background refresh.
    ///
    /// Bounded by the check timeout; when it expires the existing entry (or a
    /// placeholder) is returned instead.
    pub async fn check_now(&self, component: Component) -> Option<VersionStatus> {
        let slot = self.slots.get(&component)?;

        match timeout(
            self.options.check_timeout,
            self.fetch_and_store(component, slot),
        )
        .await
        {
            Ok(status) => Some(status),
            Err(_) => {
                warn!(
                    "Check for {} did not finish within {:?}",
                    component, self.options.check_timeout
                );
                Some(
                    slot.entry()
                        .map(|entry| entry.status)
                        .unwrap_or_else(|| VersionStatus::placeholder(component)),
                )
            }
        }
    }

    /// Wait until no refresh is in flight, up to `limit`. Returns whether it got idle.
    pub async fn wait_idle(&self, limit: Duration) -> bool {
        let idle = || {
            self.slots
                .values()
                .all(|slot| !slot.refreshing.load(Ordering::Acquire))
        };

        let poll = async {
            while !idle() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        };

        timeout(limit, poll).await.is_ok()
    }

    /// Start the periodic refresh loop.
    ///
    /// Returns `None` when background refresh is disabled or the loop was already
    /// started for this cache.
    pub fn start_background_refresh(
        self: &Arc<Self>,
        interval: Duration,
    ) -> Option<RefreshHandle> {
        if !self.options.background_refresh {
            info!("Background refresh disabled");
            return None;
        }

        if self
            .loop_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Background refresh already running");
            return None;
        }

        info!("Starting background refresh every {:?}", interval);
        Some(spawn_refresh_loop(Arc::clone(self), interval))
    }

    async fn fetch_and_store(&self, component: Component, slot: &Slot) -> VersionStatus {
        let status = self.fetch_status(component, slot).await;

        slot.replace_entry(CacheEntry::new(status.clone(), self.options.ttl));

        if status.source == StatusSource::Live
            && let Some(store) = &self.store
        {
            let _ = store
                .save(&status)
                .inspect_err(|e| error!("Failed to persist status for {}: {}", component, e));
        }

        info!(
            "{}: current {} latest {} (update available: {}, source: {})",
            component,
            status.current_version,
            status.latest_version,
            status.is_update_available,
            status.source.as_str()
        );
        status
    }

    async fn fetch_status(&self, component: Component, slot: &Slot) -> VersionStatus {
        if let Some(forced) = slot.forced_status() {
            debug!("Using forced status for {}", component);
            return VersionStatus {
                component,
                checked_at: Utc::now(),
                source: StatusSource::ForcedOverride,
                ..forced
            };
        }

        let forced_latest = slot.forced_latest();
        let fetch_timeout = self.options.fetch_timeout;

        let local = async {
            let result = timeout(fetch_timeout, slot.resolver.local().local_version()).await;
            degrade(component, "installed", result)
        };

        let remote = async {
            match &forced_latest {
                Some(version) => SemVer::parse(version),
                None => {
                    let result =
                        timeout(fetch_timeout, slot.resolver.remote().latest_version()).await;
                    degrade(component, "latest", result)
                }
            }
        };

        let (current, latest) = tokio::join!(local, remote);

        let source = if forced_latest.is_some() {
            StatusSource::ForcedOverride
        } else {
            StatusSource::Live
        };

        VersionStatus::new(component, current, latest, Utc::now(), source)
    }
}

/// Turn a provider outcome into a version, logging and absorbing every failure
fn degrade(
    component: Component,
    side: &str,
    result: Result<Result<String, ProviderError>, tokio::time::error::Elapsed>,
) -> SemVer {
    match result {
        Ok(Ok(raw)) => {
            let version = SemVer::parse(&raw);
            if !version.is_known() {
                warn!("Unparsable {} version for {}: {:?}", side, component, raw);
            }
            version
        }
        Ok(Err(e)) => {
            warn!("Failed to get {} version for {}: {}", side, component, e);
            SemVer::unknown("")
        }
        Err(_) => {
            warn!("Timed out getting {} version for {}", side, component);
            SemVer::unknown("")
        }
    }
}

fn forced_status(component: Component, forced: &ForcedStatus) -> VersionStatus {
    let mut status = VersionStatus::new(
        component,
        SemVer::parse(&forced.current_version),
        SemVer::parse(&forced.latest_version),
        Utc::now(),
        StatusSource::ForcedOverride,
    );
    if let Some(update_available) = forced.update_available {
        status.is_update_available = update_available;
    }
    status
}
