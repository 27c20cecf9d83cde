//! Which config file is in effect

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::config::Settings;

const PROJECT_FILE_NAME: &str = ".mcp.json";
const USER_FILE_NAME: &str = ".claude.json";

/// Origin of the effective config document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layer {
    /// Path set explicitly through settings or `CLAUDE_MCP_CONFIG`
    Override,
    /// `.mcp.json` in the working directory
    Project,
    /// `~/.claude.json`
    User,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Override => "override",
            Layer::Project => "project",
            Layer::User => "user",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPath {
    pub path: PathBuf,
    pub layer: Layer,
}

/// Candidate locations, highest priority first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocator {
    pub override_path: Option<PathBuf>,
    pub project_dir: PathBuf,
    pub home_dir: PathBuf,
}

impl ConfigLocator {
    /// Locator for this process: settings override, working directory and home
    pub fn from_settings(settings: &Settings) -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let project_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            override_path: settings.paths.mcp_config.clone(),
            project_dir,
            home_dir,
        }
    }

    pub fn project_path(&self) -> PathBuf {
        self.project_dir.join(PROJECT_FILE_NAME)
    }

    pub fn user_path(&self) -> PathBuf {
        self.home_dir.join(USER_FILE_NAME)
    }

    /// The override path if set (existing or not), else the first existing layer,
    /// else the user path as the place to create one.
    pub fn resolve_path(&self) -> ResolvedPath {
        if let Some(path) = &self.override_path {
            return ResolvedPath {
                path: expand_tilde(path, &self.home_dir),
                layer: Layer::Override,
            };
        }

        let project = self.project_path();
        if project.is_file() {
            return ResolvedPath {
                path: project,
                layer: Layer::Project,
            };
        }

        let user = self.user_path();
        if !user.exists() {
            debug!("No config document found, defaulting to {:?}", user);
        }
        ResolvedPath {
            path: user,
            layer: Layer::User,
        }
    }
}

fn expand_tilde(path: &Path, home_dir: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir.join(rest),
        Err(_) => path.to_path_buf(),
    }
}
