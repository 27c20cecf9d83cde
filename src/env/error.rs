use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("Environment target not writable: {path}: {source}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("User environment store ({store}) failed for {name}: {message}")]
    Store {
        store: &'static str,
        name: String,
        message: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl EnvError {
    pub(crate) fn not_writable(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| EnvError::NotWritable { path, source }
    }
}
