//! Layered JSON configuration document
//!
//! The document on disk is the source of truth. `${VAR}` placeholders stay in the
//! stored file; [`ConfigDocument::presentation`] substitutes them in a throwaway copy.

pub mod error;
pub mod locator;

use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::{ENV_AUTH_TOKEN, ENV_BASE_URL};
use crate::fs::atomic_write_create_dirs;

pub use error::DocumentError;
pub use locator::{ConfigLocator, Layer, ResolvedPath};

/// Section holding MCP server definitions
pub const MCP_SERVERS_KEY: &str = "mcpServers";

/// Variables whose placeholders may be substituted in a presentation copy
pub const MANAGED_VARS: [&str; 2] = [ENV_BASE_URL, ENV_AUTH_TOKEN];

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Read the JSON object at `path`.
///
/// A missing or blank file is an empty object. Invalid JSON and non-object
/// documents are [`DocumentError::Parse`].
pub fn read(path: &Path) -> Result<Map<String, Value>, DocumentError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No config document at {:?}", path);
            return Ok(Map::new());
        }
        Err(source) => {
            return Err(DocumentError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if content.trim().is_empty() {
        return Ok(Map::new());
    }

    serde_json::from_str(&content).map_err(|source| DocumentError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `document` as pretty JSON with sorted keys and a trailing newline.
///
/// Parent directories are created; the replacement is atomic.
pub fn write(path: &Path, document: &Map<String, Value>) -> Result<(), DocumentError> {
    let mut content = serde_json::to_string_pretty(document).map_err(|source| {
        DocumentError::Parse {
            path: path.to_path_buf(),
            source,
        }
    })?;
    content.push('\n');

    atomic_write_create_dirs(path, content.as_bytes()).map_err(|source| {
        DocumentError::NotWritable {
            path: path.to_path_buf(),
            source,
        }
    })?;
    info!("Wrote config document {:?}", path);
    Ok(())
}

/// A config document together with where it lives
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    pub resolved: ResolvedPath,
    pub content: Map<String, Value>,
}

impl ConfigDocument {
    /// Read the document the locator resolves to
    pub fn load(locator: &ConfigLocator) -> Result<Self, DocumentError> {
        let resolved = locator.resolve_path();
        let content = read(&resolved.path)?;
        Ok(Self { resolved, content })
    }

    pub fn save(&self) -> Result<(), DocumentError> {
        write(&self.resolved.path, &self.content)
    }

    pub fn section(&self, key: &str) -> Option<&Value> {
        self.content.get(key)
    }

    /// Replace one top-level section, keeping every other key
    pub fn set_section(&mut self, key: &str, value: Value) {
        self.content.insert(key.to_string(), value);
    }

    /// In-memory copy with `${VAR}` placeholders of managed variables substituted.
    ///
    /// Only string values are rewritten; keys, unmanaged variables and variables
    /// `lookup` cannot resolve stay as written.
    pub fn presentation<F>(&self, lookup: F) -> Value
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut value = Value::Object(self.content.clone());
        substitute(&mut value, &lookup);
        value
    }
}

fn substitute<F>(value: &mut Value, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(s) => {
            if PLACEHOLDER.is_match(s) {
                let replaced = PLACEHOLDER
                    .replace_all(s, |caps: &Captures| {
                        let name = &caps[1];
                        MANAGED_VARS
                            .contains(&name)
                            .then(|| lookup(name))
                            .flatten()
                            .unwrap_or_else(|| caps[0].to_string())
                    })
                    .into_owned();
                *s = replaced;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|item| substitute(item, lookup)),
        Value::Object(map) => map.values_mut().for_each(|item| substitute(item, lookup)),
        _ => {}
    }
}

/// Replace one section of the effective document on disk (read, modify, write)
pub fn update_section(
    locator: &ConfigLocator,
    key: &str,
    value: Value,
) -> Result<ResolvedPath, DocumentError> {
    let mut document = ConfigDocument::load(locator)?;
    document.set_section(key, value);
    document.save()?;
    Ok(document.resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use tempfile::TempDir;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[rstest]
    #[case::missing(None)]
    #[case::empty(Some(""))]
    #[case::blank(Some("  \n\t"))]
    fn read_returns_empty_object(#[case] content: Option<&str>) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".claude.json");
        if let Some(content) = content {
            std::fs::write(&path, content).unwrap();
        }

        assert!(read(&path).unwrap().is_empty());
    }

    #[rstest]
    #[case::malformed("{ \"mcpServers\": ")]
    #[case::array("[1, 2]")]
    #[case::string("\"text\"")]
    fn read_reports_parse_failures(#[case] content: &str) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".claude.json");
        std::fs::write(&path, content).unwrap();

        assert!(matches!(read(&path), Err(DocumentError::Parse { .. })));
    }

    #[test]
    fn write_then_read_round_trips_with_placeholders() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join(".claude.json");
        let document = as_map(json!({
            "mcpServers": {
                "api": {
                    "command": "npx",
                    "args": ["server", "--url", "${ANTHROPIC_BASE_URL}"],
                    "env": { "TOKEN": "${ANTHROPIC_AUTH_TOKEN}" }
                }
            },
            "numStartups": 3
        }));

        write(&path, &document).unwrap();

        assert_eq!(read(&path).unwrap(), document);
    }

    #[test]
    fn write_sorts_keys_and_ends_with_newline() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".mcp.json");

        write(&path, &as_map(json!({ "b": 1, "a": { "d": 2, "c": 3 } }))).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\n  \"a\": {\n    \"c\": 3,\n    \"d\": 2\n  },\n  \"b\": 1\n}\n"
        );
    }

    #[test]
    fn update_section_preserves_other_keys() {
        let temp_dir = TempDir::new().unwrap();
        let locator = ConfigLocator {
            override_path: None,
            project_dir: temp_dir.path().join("project"),
            home_dir: temp_dir.path().to_path_buf(),
        };
        std::fs::write(
            locator.user_path(),
            r#"{ "theme": "dark", "mcpServers": { "old": {} } }"#,
        )
        .unwrap();

        let resolved =
            update_section(&locator, MCP_SERVERS_KEY, json!({ "new": { "command": "x" } }))
                .unwrap();

        assert_eq!(resolved.layer, Layer::User);
        assert_eq!(
            Value::Object(read(&resolved.path).unwrap()),
            json!({ "theme": "dark", "mcpServers": { "new": { "command": "x" } } })
        );
    }

    #[test]
    fn update_section_refuses_to_overwrite_malformed_document() {
        let temp_dir = TempDir::new().unwrap();
        let locator = ConfigLocator {
            override_path: None,
            project_dir: temp_dir.path().join("project"),
            home_dir: temp_dir.path().to_path_buf(),
        };
        std::fs::write(locator.user_path(), "{ broken").unwrap();

        let result = update_section(&locator, MCP_SERVERS_KEY, json!({}));

        assert!(matches!(result, Err(DocumentError::Parse { .. })));
        assert_eq!(
            std::fs::read_to_string(locator.user_path()).unwrap(),
            "{ broken"
        );
    }

    #[test]
    fn presentation_substitutes_only_managed_resolvable_placeholders() {
        let document = ConfigDocument {
            resolved: ResolvedPath {
                path: "/tmp/.claude.json".into(),
                layer: Layer::User,
            },
            content: as_map(json!({
                "mcpServers": {
                    "api": {
                        "url": "${ANTHROPIC_BASE_URL}/v1",
                        "headers": ["Bearer ${ANTHROPIC_AUTH_TOKEN}", "${HOME}"],
                        "${ANTHROPIC_BASE_URL}": true
                    }
                },
                "count": 1
            })),
        };

        let presented = document.presentation(|name| match name {
            "ANTHROPIC_BASE_URL" => Some("https://api.example.com".to_string()),
            "HOME" => Some("/home/u".to_string()),
            _ => None,
        });

        assert_eq!(
            presented,
            json!({
                "mcpServers": {
                    "api": {
                        "url": "https://api.example.com/v1",
                        "headers": ["Bearer ${ANTHROPIC_AUTH_TOKEN}", "${HOME}"],
                        "${ANTHROPIC_BASE_URL}": true
                    }
                },
                "count": 1
            })
        );
        assert_eq!(
            document.content["mcpServers"]["api"]["url"],
            json!("${ANTHROPIC_BASE_URL}/v1")
        );
    }
}
