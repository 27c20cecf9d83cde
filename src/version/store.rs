//! Persistent store for the last computed status of each component
//!
//! Lets a short-lived process start from the previous run's answer instead of an
//! empty cache. Everything stored here is disposable.

#[cfg(test)]
use mockall::automock;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::version::error::StoreError;
use crate::version::semver::SemVer;
use crate::version::types::{Component, StatusSource, VersionStatus};

/// Bumped whenever the table layout changes; older tables are rebuilt
const SCHEMA_VERSION: i32 = 1;

/// Trait for persisting statuses between processes
#[cfg_attr(test, automock)]
pub trait StatusStore: Send + Sync + 'static {
    /// Load every stored status; returned statuses are tagged as coming from the cache
    fn load_all(&self) -> Result<Vec<VersionStatus>, StoreError>;

    /// Insert or replace the status of one component
    fn save(&self, status: &VersionStatus) -> Result<(), StoreError>;
}

pub struct SqliteStatusStore {
    conn: Mutex<Connection>,
}

impl SqliteStatusStore {
    pub fn new(db_path: &Path) -> Result<Self, StoreError> {
        info!("Initializing status database at {:?}", db_path);

        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        Ok(store)
    }

    /// Acquire database connection lock with proper error handling
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn create_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock_conn()?;

        let current_version: i32 =
            conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if current_version != SCHEMA_VERSION {
            if current_version != 0 {
                warn!(
                    "Status schema v{} does not match v{}, rebuilding",
                    current_version, SCHEMA_VERSION
                );
            }
            conn.execute("DROP TABLE IF EXISTS statuses", [])?;
        }

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS statuses (
                component TEXT PRIMARY KEY,
                current_version TEXT NOT NULL,
                latest_version TEXT NOT NULL,
                is_update_available INTEGER NOT NULL,
                checked_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        debug!("Status schema ready (v{})", SCHEMA_VERSION);
        Ok(())
    }
}

fn version_text(version: &SemVer) -> String {
    match version {
        SemVer::Known(v) => v.to_string(),
        SemVer::Unknown { raw } => raw.clone(),
    }
}

impl StatusStore for SqliteStatusStore {
    fn load_all(&self) -> Result<Vec<VersionStatus>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT component, current_version, latest_version, is_update_available, checked_at
            FROM statuses
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let statuses = rows
            .into_iter()
            .filter_map(|(component, current, latest, update, checked_at)| {
                let Ok(component) = component.parse::<Component>() else {
                    debug!("Skipping stored status for unknown component {}", component);
                    return None;
                };
                Some(VersionStatus {
                    component,
                    current_version: SemVer::parse(&current),
                    latest_version: SemVer::parse(&latest),
                    is_update_available: update,
                    checked_at: DateTime::<Utc>::from_timestamp_millis(checked_at)
                        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
                    source: StatusSource::Cache,
                })
            })
            .collect();

        Ok(statuses)
    }

    fn save(&self, status: &VersionStatus) -> Result<(), StoreError> {
        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            INSERT INTO statuses (component, current_version, latest_version, is_update_available, checked_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(component) DO UPDATE SET
                current_version = excluded.current_version,
                latest_version = excluded.latest_version,
                is_update_available = excluded.is_update_available,
                checked_at = excluded.checked_at
            "#,
            (
                status.component.as_str(),
                version_text(&status.current_version),
                version_text(&status.latest_version),
                status.is_update_available,
                status.checked_at.timestamp_millis(),
            ),
        )?;

        debug!("Saved status for {}", status.component);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, SqliteStatusStore) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let store = SqliteStatusStore::new(&db_path).unwrap();
        (temp_dir, store)
    }

    fn status(component: Component, current: &str, latest: &str) -> VersionStatus {
        VersionStatus::new(
            component,
            SemVer::parse(current),
            SemVer::parse(latest),
            DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap(),
            StatusSource::Live,
        )
    }

    #[test]
    fn load_all_returns_empty_for_new_database() {
        let (_temp_dir, store) = create_test_store();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_returns_status_tagged_as_cache() {
        let (_temp_dir, store) = create_test_store();
        let saved = status(Component::Cli, "1.0.30", "1.0.40");

        store.save(&saved).unwrap();
        let loaded = store.load_all().unwrap();

        assert_eq!(
            loaded,
            vec![VersionStatus {
                source: StatusSource::Cache,
                ..saved
            }]
        );
    }

    #[test]
    fn save_replaces_existing_component() {
        let (_temp_dir, store) = create_test_store();

        store.save(&status(Component::Cli, "1.0.30", "1.0.40")).unwrap();
        store.save(&status(Component::Cli, "1.0.40", "1.0.40")).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].current_version, SemVer::parse("1.0.40"));
        assert!(!loaded[0].is_update_available);
    }

    #[test]
    fn unknown_versions_survive_round_trip() {
        let (_temp_dir, store) = create_test_store();

        store
            .save(&status(Component::EditorExtension, "not installed", "2.0.0"))
            .unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded[0].current_version, SemVer::unknown("not installed"));
        assert_eq!(loaded[0].latest_version, SemVer::parse("2.0.0"));
    }

    #[test]
    fn reopening_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        {
            let store = SqliteStatusStore::new(&db_path).unwrap();
            store.save(&status(Component::Cli, "1.0.0", "1.0.1")).unwrap();
        }

        let store = SqliteStatusStore::new(&db_path).unwrap();
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn outdated_schema_is_rebuilt() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute("CREATE TABLE statuses (component TEXT PRIMARY KEY)", [])
                .unwrap();
            conn.execute("INSERT INTO statuses (component) VALUES ('cli')", [])
                .unwrap();
            conn.pragma_update(None, "user_version", 99).unwrap();
        }

        let store = SqliteStatusStore::new(&db_path).unwrap();
        assert!(store.load_all().unwrap().is_empty());
        store.save(&status(Component::Cli, "1.0.0", "1.0.1")).unwrap();
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn load_all_skips_unknown_components() {
        let (_temp_dir, store) = create_test_store();
        {
            let conn = store.lock_conn().unwrap();
            conn.execute(
                "INSERT INTO statuses VALUES ('desktop-app', '1.0.0', '1.0.0', 0, 0)",
                [],
            )
            .unwrap();
        }

        assert!(store.load_all().unwrap().is_empty());
    }
}
