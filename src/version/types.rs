//! Common types for version tracking

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::version::semver::{SemVer, update_available};

/// A tracked piece of tooling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Component {
    /// The `claude` command line tool
    Cli,
    /// The editor extension
    EditorExtension,
}

impl Component {
    pub const ALL: [Component; 2] = [Component::Cli, Component::EditorExtension];

    /// Returns the string representation of the component
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Cli => "cli",
            Component::EditorExtension => "editor-extension",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Component {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cli" => Ok(Component::Cli),
            "editor-extension" => Ok(Component::EditorExtension),
            _ => Err(()),
        }
    }
}

/// Where a status came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusSource {
    /// Computed by a refresh in this process
    Live,
    /// Loaded from the persistent status store
    Cache,
    /// Produced from injected override values
    ForcedOverride,
}

impl StatusSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusSource::Live => "live",
            StatusSource::Cache => "cache",
            StatusSource::ForcedOverride => "forced-override",
        }
    }
}

impl std::str::FromStr for StatusSource {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(StatusSource::Live),
            "cache" => Ok(StatusSource::Cache),
            "forced-override" => Ok(StatusSource::ForcedOverride),
            _ => Err(()),
        }
    }
}

/// Installed vs. latest version of one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionStatus {
    pub component: Component,
    pub current_version: SemVer,
    pub latest_version: SemVer,
    pub is_update_available: bool,
    pub checked_at: DateTime<Utc>,
    pub source: StatusSource,
}

impl VersionStatus {
    /// Build a status, deriving `is_update_available` from the two versions
    pub fn new(
        component: Component,
        current_version: SemVer,
        latest_version: SemVer,
        checked_at: DateTime<Utc>,
        source: StatusSource,
    ) -> Self {
        let is_update_available = update_available(&current_version, &latest_version);
        Self {
            component,
            current_version,
            latest_version,
            is_update_available,
            checked_at,
            source,
        }
    }

    /// Status reported before anything is known about a component
    pub fn placeholder(component: Component) -> Self {
        Self {
            component,
            current_version: SemVer::unknown(""),
            latest_version: SemVer::unknown(""),
            is_update_available: false,
            checked_at: DateTime::<Utc>::UNIX_EPOCH,
            source: StatusSource::Cache,
        }
    }
}
