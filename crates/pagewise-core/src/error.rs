//! Engine error types

use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a [`DataSource`](crate::source::DataSource)
///
/// Terminal for the request that produced it: the window is left untouched
/// and the error is surfaced through the window's error state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// Backing store failed (query, connection, migration)
    #[error("storage error: {0}")]
    Storage(String),

    /// Blocking worker panicked or was cancelled
    #[error("worker error: {0}")]
    Worker(String),

    /// Source is not reachable right now
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

impl From<anyhow::Error> for SourceError {
    fn from(err: anyhow::Error) -> Self {
        SourceError::Storage(err.to_string())
    }
}

impl From<rusqlite::Error> for SourceError {
    fn from(err: rusqlite::Error) -> Self {
        SourceError::Storage(err.to_string())
    }
}

impl From<tokio::task::JoinError> for SourceError {
    fn from(err: tokio::task::JoinError) -> Self {
        SourceError::Worker(err.to_string())
    }
}

/// Configuration loading error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file exists but could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`PagingConfig`](crate::config::PagingConfig)
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
