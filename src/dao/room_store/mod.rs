//! Storage abstraction for room documents.

#[cfg(feature = "mongo-store")]
pub mod mongodb;

pub mod memory;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::dao::models::RoomEntity;
use crate::dao::storage::StorageResult;

/// Live sequence of room snapshots produced by [`RoomStore::subscribe`].
///
/// The stream yields the current document on subscription, then one snapshot
/// per confirmed write (the subscriber's own writes included). It terminates
/// after yielding an error when the document disappears or becomes
/// unreadable. Dropping the stream cancels the subscription.
pub type RoomSubscription = BoxStream<'static, StorageResult<RoomEntity>>;

/// Abstraction over the replicated document store holding room state.
pub trait RoomStore: Send + Sync {
    /// Persist a room document.
    ///
    /// The write is accepted only when `room.version` is exactly one greater
    /// than the stored version (or `1` for a new document); otherwise it
    /// fails with [`StorageError::Conflict`](crate::dao::storage::StorageError::Conflict).
    fn save(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch a room by id, `None` when absent.
    fn find(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Open a live snapshot subscription for a room.
    fn subscribe(&self, id: Uuid) -> RoomSubscription;
    /// Cheap connectivity probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish a broken backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
