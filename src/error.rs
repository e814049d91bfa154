//! Error types for remdex
//!
//! This module defines the error hierarchy used by the library:
//! - Remote transport errors (connect, list, dead sessions)
//! - Document store errors (bulk write could not execute)
//! - Per-entry transform errors (captured into `FAILED` records, never raised)
//! - Run-level errors surfaced by the session pool and the pipeline coordinator
//!
//! The binary and glue code use `anyhow` on top of these.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by a remote transport backend
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Could not establish or authenticate a session
    #[error("Failed to connect to '{target}': {reason}")]
    Connect { target: String, reason: String },

    /// Listing a directory failed
    #[error("Failed to list '{path}': {reason}")]
    List {
        path: String,
        reason: String,
        transient: bool,
    },

    /// Path does not exist on the remote side
    #[error("Path not found: '{path}'")]
    NotFound { path: String },

    /// Permission denied on the remote side
    #[error("Permission denied: '{path}'")]
    PermissionDenied { path: String },

    /// The underlying connection is gone
    #[error("Session closed: {0}")]
    Closed(String),
}

impl TransportError {
    /// True if retrying the same call may succeed (network hiccup, timeout)
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::List { transient, .. } => *transient,
            TransportError::Closed(_) => true,
            TransportError::Connect { .. } => true,
            TransportError::NotFound { .. } | TransportError::PermissionDenied { .. } => false,
        }
    }

    /// True if the session that produced this error must not be reused
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, TransportError::Closed(_) | TransportError::Connect { .. })
    }
}

/// Document store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Collection or field name not allowed in generated SQL
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// Connection mutex was poisoned by a panicking writer
    #[error("Store connection poisoned")]
    Poisoned,
}

/// Per-entry metadata extraction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// Full path does not end in the entry's base name
    #[error("path '{path}' does not end with name '{name}'")]
    PathMismatch { path: String, name: String },

    /// Server reported no modification time
    #[error("modification time unavailable")]
    InvalidTimestamp,

    /// Identifier could not be derived from the path
    #[error("cannot derive identifier: {0}")]
    Identifier(String),
}

impl TransformError {
    /// Short kind name used as the prefix of stored error descriptions
    pub fn kind(&self) -> &'static str {
        match self {
            TransformError::PathMismatch { .. } => "PathMismatch",
            TransformError::InvalidTimestamp => "InvalidTimestamp",
            TransformError::Identifier(_) => "Identifier",
        }
    }
}

/// Top-level error type for pool and pipeline operations
#[derive(Error, Debug)]
pub enum IndexError {
    /// No session became available within the timeout
    #[error("Session pool exhausted: no session available after {waited:?}")]
    PoolExhausted { waited: Duration },

    /// Lazy creation of a new session failed
    #[error("Session creation failed: {0}")]
    SessionCreationFailed(#[source] TransportError),

    /// Pool was closed while waiting or before the call
    #[error("Session pool is closed")]
    PoolClosed,

    /// Directory discovery could not complete
    #[error("Directory discovery failed under '{root}'")]
    DiscoveryFailed {
        root: String,
        #[source]
        source: Box<IndexError>,
    },

    /// Listing a single directory failed
    #[error("Listing failed for '{path}'")]
    ListingFailed {
        path: String,
        #[source]
        source: TransportError,
    },

    /// Transform of a single entry failed unexpectedly (panic in a worker)
    #[error("Transform of '{path}' aborted: {message}")]
    EntryAborted { path: String, message: String },

    /// The store rejected a single record of a bulk write
    #[error("Write of record '{unique_id}' rejected: {message}")]
    RecordRejected { unique_id: String, message: String },

    /// Bulk write could not execute at all
    #[error("Bulk persist failed")]
    PersistFailed(#[source] StoreError),

    /// Too many entries were skipped
    #[error("Skip limit of {limit} exceeded")]
    SkipLimitExceeded {
        limit: usize,
        #[source]
        source: Box<IndexError>,
    },

    /// Transform worker threads could not be started
    #[error("Transform worker pool could not start: {0}")]
    WorkerPool(String),

    /// Run was cancelled between chunks
    #[error("Run cancelled")]
    Cancelled,
}

impl IndexError {
    /// True if the error came from a transient listing fault and may be retried
    pub fn is_transient_listing(&self) -> bool {
        match self {
            IndexError::ListingFailed { source, .. } => source.is_transient(),
            IndexError::PoolExhausted { .. } | IndexError::SessionCreationFailed(_) => true,
            IndexError::DiscoveryFailed { source, .. } => source.is_transient_listing(),
            _ => false,
        }
    }

    /// True if the error is scoped to a single entry or record
    pub fn is_entry_scoped(&self) -> bool {
        matches!(
            self,
            IndexError::EntryAborted { .. } | IndexError::RecordRejected { .. }
        )
    }
}

/// Result type alias for IndexError
pub type Result<T> = std::result::Result<T, IndexError>;

/// Result type alias for TransportError
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Result type alias for StoreError
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_transient() {
        let io = TransportError::List {
            path: "/data".into(),
            reason: "timeout".into(),
            transient: true,
        };
        assert!(io.is_transient());
        assert!(!io.is_connection_fault());

        let denied = TransportError::PermissionDenied {
            path: "/data".into(),
        };
        assert!(!denied.is_transient());

        let closed = TransportError::Closed("eof".into());
        assert!(closed.is_connection_fault());
    }

    #[test]
    fn test_listing_failure_classification() {
        let err = IndexError::ListingFailed {
            path: "/data/c".into(),
            source: TransportError::List {
                path: "/data/c".into(),
                reason: "reset".into(),
                transient: true,
            },
        };
        assert!(err.is_transient_listing());
        assert!(!err.is_entry_scoped());

        let rejected = IndexError::RecordRejected {
            unique_id: "abc".into(),
            message: "constraint".into(),
        };
        assert!(rejected.is_entry_scoped());
        assert!(!rejected.is_transient_listing());
    }

    #[test]
    fn test_discovery_failure_inherits_transience() {
        let transient = IndexError::DiscoveryFailed {
            root: "/data".into(),
            source: Box::new(IndexError::ListingFailed {
                path: "/data/c".into(),
                source: TransportError::List {
                    path: "/data/c".into(),
                    reason: "reset".into(),
                    transient: true,
                },
            }),
        };
        assert!(transient.is_transient_listing());

        let missing = IndexError::DiscoveryFailed {
            root: "/nope".into(),
            source: Box::new(IndexError::ListingFailed {
                path: "/nope".into(),
                source: TransportError::NotFound {
                    path: "/nope".into(),
                },
            }),
        };
        assert!(!missing.is_transient_listing());
    }
}
