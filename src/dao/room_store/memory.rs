//! In-process room store.
//!
//! Used by the test suite and as the storage fallback when no database
//! backend is configured. Subscriptions fan out through one broadcast
//! channel per room, mirroring the push behavior of a replicated store.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::dao::models::RoomEntity;
use crate::dao::room_store::{RoomStore, RoomSubscription};
use crate::dao::storage::{StorageError, StorageResult};

/// Capacity of the per-room update channel. Slow subscribers that lag past
/// this many updates are resynchronized from the authoritative copy.
const CHANNEL_CAPACITY: usize = 16;

#[derive(Clone)]
enum RoomSignal {
    Updated(Box<RoomEntity>),
    Removed,
}

/// Room store backed by process memory.
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    rooms: DashMap<Uuid, RoomEntity>,
    signals: DashMap<Uuid, broadcast::Sender<RoomSignal>>,
}

impl MemoryRoomStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete a room, pushing a terminal error to all live subscriptions.
    pub fn remove(&self, id: Uuid) -> bool {
        let removed = self.inner.rooms.remove(&id).is_some();
        if removed {
            let _ = self.signal(id).send(RoomSignal::Removed);
        }
        removed
    }

    fn signal(&self, id: Uuid) -> broadcast::Sender<RoomSignal> {
        self.inner
            .signals
            .entry(id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    fn save_sync(&self, room: RoomEntity) -> StorageResult<()> {
        match self.inner.rooms.entry(room.id) {
            Entry::Occupied(mut slot) => {
                let stored = slot.get().version;
                if room.version != stored + 1 {
                    return Err(StorageError::Conflict {
                        id: room.id,
                        attempted: room.version,
                        stored,
                    });
                }
                slot.insert(room.clone());
            }
            Entry::Vacant(slot) => {
                if room.version != 1 {
                    return Err(StorageError::Conflict {
                        id: room.id,
                        attempted: room.version,
                        stored: 0,
                    });
                }
                slot.insert(room.clone());
            }
        }

        let _ = self.signal(room.id).send(RoomSignal::Updated(Box::new(room)));
        Ok(())
    }
}

impl RoomStore for MemoryRoomStore {
    fn save(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_sync(room) })
    }

    fn find(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.rooms.get(&id).map(|room| room.clone())) })
    }

    fn subscribe(&self, id: Uuid) -> RoomSubscription {
        let store = self.clone();
        Box::pin(async_stream::stream! {
            // Register for updates before reading the current snapshot so no
            // write can slip between the two.
            let mut receiver = store.signal(id).subscribe();

            match store.inner.rooms.get(&id).map(|room| room.clone()) {
                Some(room) => yield Ok(room),
                None => {
                    yield Err(StorageError::NotFound { id });
                    return;
                }
            }

            loop {
                match receiver.recv().await {
                    Ok(RoomSignal::Updated(room)) => yield Ok(*room),
                    Ok(RoomSignal::Removed) => {
                        yield Err(StorageError::NotFound { id });
                        return;
                    }
                    Err(RecvError::Closed) => return,
                    Err(RecvError::Lagged(_)) => {
                        // Resynchronize from the authoritative copy.
                        match store.inner.rooms.get(&id).map(|room| room.clone()) {
                            Some(room) => yield Ok(room),
                            None => {
                                yield Err(StorageError::NotFound { id });
                                return;
                            }
                        }
                    }
                }
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::{ParticipantEntity, ParticipantRoleEntity, RoomStatusEntity};
    use futures::StreamExt;
    use std::time::SystemTime;

    fn room(id: Uuid, version: u64) -> RoomEntity {
        let owner = ParticipantEntity {
            id: Uuid::new_v4(),
            name: "Alice".into(),
            vote: None,
            color: "#E57373".into(),
            role: ParticipantRoleEntity::Voter,
        };
        RoomEntity {
            id,
            owner_participant_id: owner.id,
            owner_name: owner.name.clone(),
            voting_prompt: "Story 42".into(),
            participants: vec![owner],
            status: RoomStatusEntity::Waiting,
            votes_revealed: false,
            current_round: 1,
            round_history: Vec::new(),
            created_at: SystemTime::now(),
            version,
        }
    }

    #[tokio::test]
    async fn save_rejects_version_gaps() {
        let store = MemoryRoomStore::new();
        let id = Uuid::new_v4();

        store.save(room(id, 1)).await.unwrap();
        store.save(room(id, 2)).await.unwrap();

        // Repeating version 2 is a stale write.
        let err = store.save(room(id, 2)).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Conflict {
                attempted: 2,
                stored: 2,
                ..
            }
        ));

        // Skipping ahead is rejected too.
        let err = store.save(room(id, 5)).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { attempted: 5, .. }));
    }

    #[tokio::test]
    async fn new_rooms_must_start_at_version_one() {
        let store = MemoryRoomStore::new();
        let err = store.save(room(Uuid::new_v4(), 3)).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { stored: 0, .. }));
    }

    #[tokio::test]
    async fn subscribe_yields_current_then_updates() {
        let store = MemoryRoomStore::new();
        let id = Uuid::new_v4();
        store.save(room(id, 1)).await.unwrap();

        let mut stream = store.subscribe(id);
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.version, 1);

        store.save(room(id, 2)).await.unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.version, 2);
    }

    #[tokio::test]
    async fn subscribe_to_missing_room_fails_immediately() {
        let store = MemoryRoomStore::new();
        let mut stream = store.subscribe(Uuid::new_v4());
        assert!(matches!(
            stream.next().await,
            Some(Err(StorageError::NotFound { .. }))
        ));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn removal_terminates_subscriptions() {
        let store = MemoryRoomStore::new();
        let id = Uuid::new_v4();
        store.save(room(id, 1)).await.unwrap();

        let mut stream = store.subscribe(id);
        stream.next().await.unwrap().unwrap();

        assert!(store.remove(id));
        assert!(matches!(
            stream.next().await,
            Some(Err(StorageError::NotFound { .. }))
        ));
        assert!(stream.next().await.is_none());
    }
}
