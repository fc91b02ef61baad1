//! Error types for goes-dl
//!
//! Errors are split by the component that raises them:
//! - [`StoreError`] — task store failures. These are returned synchronously to
//!   the caller and never retried internally.
//! - [`FetchError`] — per-item transfer failures. These never escape the
//!   fetcher's control flow; they are handed to the error callback instead.

use thiserror::Error;

/// Result type alias for goes-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for goes-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "batch_size")
        key: Option<String>,
    },

    /// Task store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Dataset fetch failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to build the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Task store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file could not be created or opened
    #[error("failed to open task store: {0}")]
    OpenFailed(String),

    /// Schema creation or migration failed
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// A task with this name already exists
    #[error("task {name} already exists")]
    Duplicate {
        /// The conflicting task name
        name: String,
    },

    /// No task with this name exists
    #[error("task {name} does not exist")]
    UnknownTask {
        /// The name that was looked up
        name: String,
    },

    /// The task already reached a terminal state
    #[error("task {name} is already {status}")]
    AlreadyFinalized {
        /// The task name
        name: String,
        /// The terminal status it holds (e.g., "PROCESSED")
        status: String,
    },

    /// Only a claimed (`TAKEN`) task can be finalized
    #[error("task {name} is {status} and must be taken before it is finalized")]
    InvalidTransition {
        /// The task name
        name: String,
        /// The status it holds (e.g., "PENDING")
        status: String,
    },

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// The store handle was closed
    #[error("task store is closed")]
    Closed,
}

impl StoreError {
    /// Map a sqlx error from `operation`, recognising a closed pool
    pub(crate) fn query(operation: &str, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed => StoreError::Closed,
            other => StoreError::QueryFailed(format!("Failed to {}: {}", operation, other)),
        }
    }
}

/// Per-item fetch failures, reported through the error callback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The identifier could not be mapped to a transfer source
    #[error("cannot resolve {name}: {reason}")]
    Resolution {
        /// The identifier that failed to resolve
        name: String,
        /// Why resolution failed
        reason: String,
    },

    /// Network or HTTP failure while downloading
    #[error("transfer of {url} failed: {reason}")]
    Transfer {
        /// The source URL
        url: String,
        /// HTTP status code, when the server answered
        status: Option<u16>,
        /// Why the transfer failed
        reason: String,
    },

    /// The payload is not a valid dataset
    #[error("invalid dataset payload: {reason}")]
    Decode {
        /// Why decoding failed
        reason: String,
    },
}

impl FetchError {
    /// Machine-readable error code, stable across releases
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Resolution { .. } => "resolution_error",
            FetchError::Transfer { .. } => "transfer_error",
            FetchError::Decode { .. } => "decode_error",
        }
    }
}
