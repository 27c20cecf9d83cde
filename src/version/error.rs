use thiserror::Error;

use crate::process::ProcessError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Status store lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Not installed: {0}")]
    NotInstalled(String),

    #[error("Package not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
