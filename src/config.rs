use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

// =============================================================================
// Time-related constants
// =============================================================================

/// Default refresh interval in seconds (10 minutes)
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 10 * 60;

/// Timeout for a single provider call in milliseconds (6 seconds)
pub const FETCH_TIMEOUT_MS: u64 = 6_000;

/// Upper bound for an explicit "check now" in milliseconds (15 seconds)
pub const CHECK_TIMEOUT_MS: u64 = 15_000;

/// Delay between starting each component refresh (10ms)
pub const FETCH_STAGGER_DELAY_MS: u64 = 10;

// =============================================================================
// Names and defaults
// =============================================================================

/// Environment variable carrying the API base URL
pub const ENV_BASE_URL: &str = "ANTHROPIC_BASE_URL";

/// Environment variable carrying the auth token
pub const ENV_AUTH_TOKEN: &str = "ANTHROPIC_AUTH_TOKEN";

/// npm package whose `latest` dist-tag is the newest CLI release
pub const CLI_PACKAGE_NAME: &str = "@anthropic-ai/claude-code";

/// Default npm registry
pub const DEFAULT_NPM_REGISTRY: &str = "https://registry.npmjs.org";

/// Default Open VSX endpoint
pub const DEFAULT_OPEN_VSX_URL: &str = "https://open-vsx.org";

const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Application settings
///
/// Read from `<data_dir>/settings.json`; environment variables win over file values.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub cache: CacheSettings,
    pub providers: ProviderSettings,
    pub paths: PathSettings,
    pub overrides: OverrideSettings,
}

/// Cache-related configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheSettings {
    /// Refresh interval (TTL and timer cadence) in seconds
    pub refresh_interval_secs: u64,
    /// Per-provider timeout in milliseconds
    pub fetch_timeout_ms: u64,
    /// Whether the periodic refresh loop may be started
    pub background_refresh: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            fetch_timeout_ms: FETCH_TIMEOUT_MS,
            background_refresh: true,
        }
    }
}

/// Which registry answers "latest" for the editor extension
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExtensionRegistry {
    /// The extension ships in lockstep with the npm CLI package
    #[default]
    Npm,
    OpenVsx,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderSettings {
    pub npm_registry: String,
    pub open_vsx_url: String,
    pub extension_registry: ExtensionRegistry,
    /// Executable name of the managed CLI
    pub cli_command: String,
    /// Executable name of the editor
    pub editor_command: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            npm_registry: DEFAULT_NPM_REGISTRY.to_string(),
            open_vsx_url: DEFAULT_OPEN_VSX_URL.to_string(),
            extension_registry: ExtensionRegistry::default(),
            cli_command: "claude".to_string(),
            editor_command: "code".to_string(),
        }
    }
}

/// Filesystem targets; `None` means "use the platform default"
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PathSettings {
    pub env_file: Option<PathBuf>,
    pub mcp_config: Option<PathBuf>,
    pub shell_profiles: Option<Vec<PathBuf>>,
}

/// Values injected by tests or operators in place of live lookups
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct OverrideSettings {
    /// Forced "latest" version applied to every tracked component
    pub latest_version: Option<String>,
    /// Forced full status keyed by component id (`cli`, `editor-extension`)
    pub status: HashMap<String, ForcedStatus>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForcedStatus {
    pub current_version: String,
    pub latest_version: String,
    /// Computed from the two versions when omitted
    pub update_available: Option<bool>,
}

impl Settings {
    /// Load settings for this process: file in the data dir, then environment.
    pub fn load() -> Result<Self, ConfigError> {
        let data_dir = data_dir();
        let mut settings = Self::from_file(&data_dir.join(SETTINGS_FILE_NAME))?;
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Read settings from a JSON file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment variable overrides using the given lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = non_empty("CLAUDE_ENV_FILE") {
            self.paths.env_file = Some(PathBuf::from(path));
        }
        if let Some(path) = non_empty("CLAUDE_MCP_CONFIG") {
            self.paths.mcp_config = Some(PathBuf::from(path));
        }
        if let Some(version) = non_empty("FORCE_LATEST_VERSION") {
            self.overrides.latest_version = Some(version.trim().to_string());
        }
        if let Some(registry) = non_empty("CCUI_NPM_REGISTRY") {
            self.providers.npm_registry = registry.trim_end_matches('/').to_string();
        }
        if let Some(flag) = non_empty("CCUI_DISABLE_BACKGROUND_REFRESH") {
            match flag.trim() {
                "1" | "true" | "yes" => self.cache.background_refresh = false,
                "0" | "false" | "no" => self.cache.background_refresh = true,
                other => warn!(
                    "Ignoring CCUI_DISABLE_BACKGROUND_REFRESH={:?}: expected 1 or 0",
                    other
                ),
            }
        }
    }

    /// Path of the generated environment file
    pub fn env_file_path(&self) -> PathBuf {
        self.paths
            .env_file
            .clone()
            .unwrap_or_else(|| default_env_file_with_home(dirs::home_dir()))
    }

    /// Shell profiles that receive the managed PATH line
    pub fn shell_profiles(&self) -> Vec<PathBuf> {
        if let Some(profiles) = &self.paths.shell_profiles {
            return profiles.clone();
        }
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        vec![home.join(".zprofile"), home.join(".zshrc")]
    }
}

/// Returns the path to the data directory.
/// Uses $CCUI_DATA_DIR if set, otherwise ~/.ccui-web, or ./.ccui-web without a home.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("CCUI_DATA_DIR").ok(), dirs::home_dir())
}

/// Returns the path to the status database file.
pub fn db_path() -> PathBuf {
    data_dir().join("versions.db")
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("ccui-state.log")
}

fn data_dir_with_env(data_dir: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    data_dir
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".ccui-web")))
        .unwrap_or_else(|| PathBuf::from(".ccui-web"))
}

fn default_env_file_with_home(home_dir: Option<PathBuf>) -> PathBuf {
    let path = home_dir
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".claude-code-env");
    if cfg!(windows) {
        path.with_extension("bat")
    } else {
        path
    }
}
