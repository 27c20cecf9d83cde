//! Installed-vs-latest version tracking
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  Providers   │────▶│ VersionCache │◀────│   Refresh    │
//! │(local/remote)│     │ (TTL, slots) │     │ (timer loop) │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!                             │
//!                             ▼
//!                      ┌──────────────┐
//!                      │ StatusStore  │
//!                      │  (SQLite)    │
//!                      └──────────────┘
//! ```
//!
//! - [`semver`]: tolerant version parsing and comparison
//! - [`provider`]: traits for installed and latest version lookups
//! - [`providers`]: CLI, editor, npm and Open VSX implementations
//! - [`resolver`]: provider pairs per component
//! - [`cache`]: in-memory status cache with non-blocking refresh
//! - [`refresh`]: periodic refresh loop
//! - [`store`]: persistence of the last status between runs

pub mod cache;
pub mod error;
pub mod provider;
pub mod providers;
pub mod refresh;
pub mod resolver;
pub mod semver;
pub mod store;
pub mod types;
