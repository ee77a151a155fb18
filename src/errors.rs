//! Error types for the index engine
//!
//! Propagation policy:
//! - All errors surface synchronously from the call that triggered them.
//! - Backend failures are propagated unchanged, never retried here;
//!   durability decisions belong to the caller.
//! - Duplicate add and remove-of-absent are defined as success, not error.

use thiserror::Error;

use crate::engine::IndexId;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors surfaced by the index engine and registry
#[derive(Debug, Error)]
pub enum IndexError {
    /// Accessor requested for an index that is not yet online
    #[error("index {0} is not online yet")]
    NotOnline(IndexId),

    /// Population of an index was aborted; the reason is retained
    #[error("population of index {id} failed: {reason}")]
    PopulationFailed {
        /// Identifier of the failed index
        id: IndexId,
        /// Human-readable failure reason recorded at mark-failed time
        reason: String,
    },

    /// A change-feed record carried an update mode tag the engine does
    /// not recognize. A caller bug, not a recoverable runtime condition.
    #[error("unsupported update mode tag: {0}")]
    UnsupportedUpdateMode(u8),

    /// A change-feed record was missing a value its mode requires
    #[error("malformed update record: {0}")]
    MalformedUpdate(String),

    /// Stored posting-list bytes failed to decode
    #[error("corrupt posting list: {0}")]
    Corrupt(String),

    /// Failure from the storage backend (disk full, corruption, permission)
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<redb::DatabaseError> for IndexError {
    fn from(e: redb::DatabaseError) -> Self {
        IndexError::Backend(e.to_string())
    }
}

impl From<redb::TransactionError> for IndexError {
    fn from(e: redb::TransactionError) -> Self {
        IndexError::Backend(e.to_string())
    }
}

impl From<redb::TableError> for IndexError {
    fn from(e: redb::TableError) -> Self {
        IndexError::Backend(e.to_string())
    }
}

impl From<redb::StorageError> for IndexError {
    fn from(e: redb::StorageError) -> Self {
        IndexError::Backend(e.to_string())
    }
}

impl From<redb::CommitError> for IndexError {
    fn from(e: redb::CommitError) -> Self {
        IndexError::Backend(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_online_display() {
        let err = IndexError::NotOnline(7);
        assert_eq!(format!("{}", err), "index 7 is not online yet");
    }

    #[test]
    fn test_population_failed_retains_reason() {
        let err = IndexError::PopulationFailed {
            id: 3,
            reason: "source scan aborted".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("index 3"));
        assert!(display.contains("source scan aborted"));
    }
}
