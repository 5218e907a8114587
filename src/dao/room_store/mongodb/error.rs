//! Error taxonomy for the MongoDB room store.

use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

/// Result alias scoped to MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Transport-level failures raised by the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// The offending URI.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Client construction from parsed options failed.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The initial connection ping never succeeded.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Number of ping attempts made.
        attempts: u32,
        /// Driver error from the last attempt.
        #[source]
        source: MongoError,
    },
    /// A health-check ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Persisting a room document failed.
    #[error("failed to save room `{id}`")]
    SaveRoom {
        /// Room the write targeted.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Loading a room document failed.
    #[error("failed to load room `{id}`")]
    LoadRoom {
        /// Room the read targeted.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Opening or pumping a change stream failed.
    #[error("change stream failure for room `{id}`")]
    ChangeStream {
        /// The watched room.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A stored document could not be decoded into a room entity.
    #[error("room `{id}` holds an undecodable document: {detail}")]
    DecodeRoom {
        /// The offending room.
        id: Uuid,
        /// What failed to decode.
        detail: String,
    },
}
