//! Generated environment file
//!
//! The file is owned by this tool: every write regenerates it from scratch.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use crate::config::{ENV_AUTH_TOKEN, ENV_BASE_URL};
use crate::env::error::EnvError;
use crate::fs::atomic_write;

/// Environment variables to persist, keyed and ordered by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVarSet(BTreeMap<String, String>);

impl EnvVarSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Variables for an account: API base URL and auth token
    pub fn for_account(base_url: &str, auth_token: &str) -> Result<Self, EnvError> {
        let mut vars = Self::new();
        vars.insert(ENV_BASE_URL, base_url)?;
        vars.insert(ENV_AUTH_TOKEN, auth_token)?;
        Ok(vars)
    }

    /// Insert or replace a variable. Names must be shell identifiers and values
    /// must fit on one line.
    pub fn insert(&mut self, name: &str, value: &str) -> Result<(), EnvError> {
        if !is_valid_name(name) {
            return Err(EnvError::InvalidInput(format!(
                "{:?} is not a valid variable name",
                name
            )));
        }
        if value.contains(['\n', '\r', '\0']) {
            return Err(EnvError::InvalidInput(format!(
                "value of {} spans multiple lines",
                name
            )));
        }
        self.0.insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Syntax of the generated file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvFileFormat {
    /// `export NAME="value"` lines for POSIX shells
    Posix,
    /// `set "NAME=value"` lines for cmd.exe
    Batch,
}

impl EnvFileFormat {
    /// `.bat` and `.cmd` files are batch scripts, everything else is POSIX
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("bat") || ext.eq_ignore_ascii_case("cmd") => {
                EnvFileFormat::Batch
            }
            _ => EnvFileFormat::Posix,
        }
    }
}

/// Escape a value for use inside POSIX double quotes
pub(crate) fn posix_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Escape a value for use inside `set "NAME=value"`.
///
/// `%` is doubled so the value is not expanded when the file is `call`ed. A double
/// quote cannot be expressed inside the quoted assignment and is rejected.
pub(crate) fn batch_quote(name: &str, value: &str) -> Result<String, EnvError> {
    if value.contains('"') {
        return Err(EnvError::InvalidInput(format!(
            "value of {} contains a double quote, which batch files cannot store",
            name
        )));
    }
    Ok(value.replace('%', "%%"))
}

/// Render the file content for `vars`
pub fn render(vars: &EnvVarSet, format: EnvFileFormat) -> Result<String, EnvError> {
    let mut out = String::new();
    match format {
        EnvFileFormat::Posix => {
            out.push_str("# Generated by ccui-state. Changes are overwritten.\n");
            for (name, value) in vars.iter() {
                out.push_str(&format!("export {}={}\n", name, posix_quote(value)));
            }
        }
        EnvFileFormat::Batch => {
            out.push_str("@echo off\r\n");
            out.push_str("rem Generated by ccui-state. Changes are overwritten.\r\n");
            for (name, value) in vars.iter() {
                let value = batch_quote(name, value)?;
                out.push_str(&format!("set \"{}={}\"\r\n", name, value));
            }
        }
    }
    Ok(out)
}

/// Regenerate the env file at `path` from `vars`.
///
/// The format follows the file extension. The write is atomic; a missing parent
/// directory is reported as [`EnvError::NotWritable`]. Values the format cannot
/// hold are rejected before anything is written.
pub fn write_env_file(path: &Path, vars: &EnvVarSet) -> Result<(), EnvError> {
    let content = render(vars, EnvFileFormat::for_path(path))?;
    atomic_write(path, content.as_bytes()).map_err(EnvError::not_writable(path))?;
    info!("Wrote {} variables to {:?}", vars.len(), path);
    Ok(())
}
