//! MongoDB implementation of [`RoomStore`].
//!
//! Saves enforce the version check with a filtered `replace_one`, and
//! subscriptions ride on MongoDB change streams so every confirmed write to a
//! room document (from this process or any other) reaches subscribers.

use std::sync::Arc;

use futures::{StreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    change_stream::event::OperationType,
    bson::doc,
    options::FullDocumentType,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoRoomDocument, doc_id, doc_id_at_version, watch_filter},
};
use crate::dao::{
    models::RoomEntity,
    room_store::{RoomStore, RoomSubscription},
    storage::{StorageError, StorageResult},
};

const ROOM_COLLECTION_NAME: &str = "rooms";

/// Room store backed by a MongoDB collection.
#[derive(Clone)]
pub struct MongoRoomStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    // The client owns the connection pool; kept alive alongside its database
    // handle so reconnects can swap both atomically.
    _client: Client,
    database: Database,
}

impl MongoRoomStore {
    /// Establish a connection to MongoDB and verify it with a ping.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        Ok(Self {
            inner: Arc::new(MongoInner {
                state: RwLock::new(MongoState {
                    _client: client,
                    database,
                }),
                config,
            }),
        })
    }

    async fn collection(&self) -> Collection<MongoRoomDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoRoomDocument>(ROOM_COLLECTION_NAME)
    }

    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.inner.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = establish_connection(
            &self.inner.config.options,
            &self.inner.config.database_name,
        )
        .await?;
        let mut guard = self.inner.state.write().await;
        guard._client = client;
        guard.database = database;
        Ok(())
    }

    async fn find_room(&self, id: Uuid) -> StorageResult<Option<RoomEntity>> {
        let collection = self.collection().await;

        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadRoom { id, source })?;

        match document {
            Some(document) => Ok(Some(RoomEntity::try_from(document)?)),
            None => Ok(None),
        }
    }

    async fn stored_version(&self, id: Uuid) -> u64 {
        match self.find_room(id).await {
            Ok(Some(room)) => room.version,
            _ => 0,
        }
    }

    async fn save_room(&self, room: RoomEntity) -> StorageResult<()> {
        let id = room.id;
        let version = room.version;
        let document: MongoRoomDocument = room.into();
        let collection = self.collection().await;

        if version == 1 {
            return match collection.insert_one(&document).await {
                Ok(_) => Ok(()),
                Err(err) if is_duplicate_key(&err) => Err(StorageError::Conflict {
                    id,
                    attempted: version,
                    stored: self.stored_version(id).await,
                }),
                Err(source) => Err(MongoDaoError::SaveRoom { id, source }.into()),
            };
        }

        let result = collection
            .replace_one(doc_id_at_version(id, version - 1), &document)
            .await
            .map_err(|source| MongoDaoError::SaveRoom { id, source })?;

        if result.matched_count == 0 {
            return Err(StorageError::Conflict {
                id,
                attempted: version,
                stored: self.stored_version(id).await,
            });
        }

        Ok(())
    }
}

impl RoomStore for MongoRoomStore {
    fn save(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_room(room).await })
    }

    fn find(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_room(id).await })
    }

    fn subscribe(&self, id: Uuid) -> RoomSubscription {
        let store = self.clone();
        Box::pin(async_stream::stream! {
            let collection = store.collection().await;
            let change_stream = collection
                .watch()
                .pipeline([watch_filter(id)])
                .full_document(FullDocumentType::UpdateLookup)
                .await;

            let mut change_stream = match change_stream {
                Ok(stream) => stream,
                Err(source) => {
                    yield Err(MongoDaoError::ChangeStream { id, source }.into());
                    return;
                }
            };

            // Emit the current snapshot only after the change stream is open
            // so no write can fall between the two.
            match store.find_room(id).await {
                Ok(Some(room)) => yield Ok(room),
                Ok(None) => {
                    yield Err(StorageError::NotFound { id });
                    return;
                }
                Err(err) => {
                    yield Err(err);
                    return;
                }
            }

            while let Some(event) = change_stream.next().await {
                match event {
                    Ok(event) => match event.operation_type {
                        OperationType::Insert
                        | OperationType::Replace
                        | OperationType::Update => {
                            if let Some(document) = event.full_document {
                                match RoomEntity::try_from(document) {
                                    Ok(room) => yield Ok(room),
                                    Err(err) => {
                                        yield Err(err.into());
                                        return;
                                    }
                                }
                            }
                        }
                        OperationType::Delete
                        | OperationType::Drop
                        | OperationType::Invalidate => {
                            yield Err(StorageError::NotFound { id });
                            return;
                        }
                        _ => {}
                    },
                    Err(source) => {
                        yield Err(MongoDaoError::ChangeStream { id, source }.into());
                        return;
                    }
                }
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.reconnect().await.map_err(Into::into) })
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    matches!(
        &*err.kind,
        ErrorKind::Write(WriteFailure::WriteError(write_err)) if write_err.code == 11000
    )
}
