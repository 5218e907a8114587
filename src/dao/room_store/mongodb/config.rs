//! MongoDB connection configuration.

use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

/// Default database name when `MONGO_DB` is not set.
const DEFAULT_DATABASE: &str = "scrum_poker";

/// Parsed connection options plus the target database name.
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed driver options.
    pub options: ClientOptions,
    /// Database holding the room collection.
    pub database_name: String,
}

impl MongoConfig {
    /// Build a configuration from a URI and an optional database name.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or(DEFAULT_DATABASE).to_owned();
        let options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            })?;

        Ok(Self {
            options,
            database_name,
        })
    }
}
