//! Backend-agnostic storage errors.

use std::error::Error;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or failed mid-operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the failing operation.
        message: String,
        /// Backend-specific cause.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The save carried a version that does not follow the stored one.
    /// The caller's copy of the room is stale; it must observe the fresh
    /// snapshot before retrying.
    #[error("version conflict on room `{id}`: tried to write version {attempted}, store holds {stored}")]
    Conflict {
        /// Room the write targeted.
        id: Uuid,
        /// Version the rejected write carried.
        attempted: u64,
        /// Version currently stored.
        stored: u64,
    },
    /// The requested room does not exist (or no longer exists).
    #[error("room `{id}` not found in storage")]
    NotFound {
        /// The missing room.
        id: Uuid,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
