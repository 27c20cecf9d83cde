//! Version and environment state manager for the Claude Code CLI.
//!
//! # Modules
//!
//! - [`version`]: version parsing, providers, the TTL cache and its background refresh
//! - [`env`]: persistence of credential-derived environment variables
//! - [`document`]: layered JSON configuration resolution and editing
//! - [`config`]: settings, paths and timing constants
//! - [`logging`]: tracing subscriber setup
//! - [`fs`]: atomic file writes
//! - [`process`]: bounded external command execution

pub mod config;
pub mod document;
pub mod env;
pub mod fs;
pub mod logging;
pub mod process;
pub mod version;
