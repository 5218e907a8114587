//! Live handle over one room: serialized mutations, storage writes, and
//! fan-out of confirmed snapshots to connected clients.

use std::{fmt, sync::Arc};

use futures::StreamExt;
use tokio::{
    sync::{Mutex, RwLock, watch},
    task::JoinHandle,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::{room_store::RoomStore, storage::StorageError},
    error::ServiceError,
    state::{
        room::Room,
        state_machine::{RoomEvent, compute_transition},
    },
};

/// Message published on a session's watch channel.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// Latest confirmed state of the room.
    Room(Box<Room>),
    /// The room document disappeared from storage; the session is dead.
    Terminated,
}

/// Live session bound to one room document.
///
/// All mutations go through [`RoomSession::mutate`], which serializes them
/// behind a gate, validates the transition, persists the next version, and
/// only then adopts and publishes the new state. External writes confirmed by
/// the store's subscription stream are folded in by a background task.
pub struct RoomSession {
    room_id: Uuid,
    store: Arc<dyn RoomStore>,
    room: RwLock<Room>,
    // Serializes the read-modify-persist cycle of local mutations.
    gate: Mutex<()>,
    updates: watch::Sender<SessionUpdate>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl RoomSession {
    /// Open a session over an already persisted room and start following the
    /// store's subscription stream.
    pub fn open(store: Arc<dyn RoomStore>, room: Room) -> Arc<Self> {
        let (updates, _) = watch::channel(SessionUpdate::Room(Box::new(room.clone())));

        let session = Arc::new(Self {
            room_id: room.id,
            store,
            room: RwLock::new(room),
            gate: Mutex::new(()),
            updates,
            subscription: Mutex::new(None),
        });

        session.clone().spawn_subscription();
        session
    }

    /// Identifier of the room this session follows.
    pub fn room_id(&self) -> Uuid {
        self.room_id
    }

    /// Clone of the latest confirmed room state.
    pub async fn room(&self) -> Room {
        self.room.read().await.clone()
    }

    /// Subscribe to confirmed state updates. The receiver immediately holds
    /// the current state.
    pub fn updates(&self) -> watch::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    /// Apply a mutation to the room.
    ///
    /// The event is checked against the transition table first, then `apply`
    /// edits a draft copy. The draft is persisted at `version + 1`; only a
    /// confirmed write is adopted and published. A storage conflict leaves
    /// the local state untouched.
    pub async fn mutate<F, T>(&self, event: RoomEvent, apply: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Room) -> Result<T, ServiceError>,
    {
        let _gate = self.gate.lock().await;

        let mut draft = self.room.read().await.clone();
        let next_phase = compute_transition(draft.phase(), event)?;

        let value = apply(&mut draft)?;
        draft.apply_phase(next_phase);
        draft.version += 1;

        self.store.save(draft.clone().into()).await?;

        self.adopt(draft).await;
        Ok(value)
    }

    /// Apply a mutation unless the room is already in the target state.
    ///
    /// `already_done` is evaluated under the same gate as the mutation, so
    /// two racing idempotent calls cannot both attempt the transition: the
    /// later one observes the done state and gets it back unchanged, version
    /// included.
    pub async fn mutate_idempotent<S, F>(
        &self,
        event: RoomEvent,
        already_done: S,
        apply: F,
    ) -> Result<Room, ServiceError>
    where
        S: FnOnce(&Room) -> bool,
        F: FnOnce(&mut Room) -> Result<(), ServiceError>,
    {
        let _gate = self.gate.lock().await;

        let mut draft = self.room.read().await.clone();
        if already_done(&draft) {
            return Ok(draft);
        }

        let next_phase = compute_transition(draft.phase(), event)?;
        apply(&mut draft)?;
        draft.apply_phase(next_phase);
        draft.version += 1;

        self.store.save(draft.clone().into()).await?;

        let room = draft.clone();
        self.adopt(draft).await;
        Ok(room)
    }

    /// Stop following the store. Used when the registry evicts the session.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.subscription.lock().await.take() {
            handle.abort();
        }
    }

    async fn adopt(&self, room: Room) {
        let mut guard = self.room.write().await;
        if room.version < guard.version {
            return;
        }
        *guard = room.clone();
        drop(guard);
        let _ = self.updates.send(SessionUpdate::Room(Box::new(room)));
    }

    fn spawn_subscription(self: Arc<Self>) {
        let session = self.clone();
        let handle = tokio::spawn(async move {
            let mut stream = session.store.subscribe(session.room_id);
            while let Some(item) = stream.next().await {
                match item {
                    Ok(entity) => {
                        let incoming: Room = entity.into();
                        let known = session.room.read().await.version;
                        if incoming.version > known {
                            session.adopt(incoming).await;
                        }
                    }
                    Err(StorageError::NotFound { id }) => {
                        debug!(room_id = %id, "room document disappeared, ending session");
                        let _ = session.updates.send(SessionUpdate::Terminated);
                        break;
                    }
                    Err(err) => {
                        warn!(room_id = %session.room_id, error = %err, "room subscription failed");
                        break;
                    }
                }
            }
        });

        // Uncontended at open time, so the slot is always available.
        if let Ok(mut guard) = self.subscription.try_lock() {
            if let Some(previous) = guard.replace(handle) {
                previous.abort();
            }
        } else {
            handle.abort();
        }
    }
}

impl fmt::Debug for RoomSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomSession")
            .field("room_id", &self.room_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::{
        dao::room_store::memory::MemoryRoomStore,
        state::room::{Participant, ParticipantRole},
    };

    fn seed_room() -> Room {
        let owner = Participant {
            id: Uuid::new_v4(),
            name: "Alice".into(),
            vote: None,
            color: "#E57373".into(),
            role: ParticipantRole::Voter,
        };
        let mut room = Room::new("Login story".into(), owner);
        room.version = 1;
        room
    }

    async fn persisted_session(store: &MemoryRoomStore) -> (Arc<RoomSession>, Room) {
        let room = seed_room();
        store.save(room.clone().into()).await.unwrap();
        let session = RoomSession::open(Arc::new(store.clone()), room.clone());
        (session, room)
    }

    #[tokio::test]
    async fn mutate_persists_and_bumps_version() {
        let store = MemoryRoomStore::new();
        let (session, room) = persisted_session(&store).await;
        let voter = room.owner_participant_id;

        session
            .mutate(
                RoomEvent::VoteCast {
                    participant_id: voter,
                },
                |draft| {
                    draft.participant_mut(voter).unwrap().vote = Some("5".into());
                    Ok(())
                },
            )
            .await
            .unwrap();

        let current = session.room().await;
        assert_eq!(current.version, 2);
        assert_eq!(current.participant(voter).unwrap().vote.as_deref(), Some("5"));

        let stored = store.find(room.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn idempotent_mutation_skips_when_already_done() {
        let store = MemoryRoomStore::new();
        let (session, _) = persisted_session(&store).await;

        let first = session
            .mutate_idempotent(RoomEvent::VotesRevealed, |room| room.votes_revealed, |_| {
                Ok(())
            })
            .await
            .unwrap();
        assert!(first.votes_revealed);
        assert_eq!(first.version, 2);

        // Instead of an illegal transition the second call returns the done
        // state untouched.
        let second = session
            .mutate_idempotent(RoomEvent::VotesRevealed, |room| room.votes_revealed, |_| {
                Ok(())
            })
            .await
            .unwrap();
        assert!(second.votes_revealed);
        assert_eq!(second.version, 2);
    }

    #[tokio::test]
    async fn debug_output_names_the_room() {
        let store = MemoryRoomStore::new();
        let (session, room) = persisted_session(&store).await;

        let rendered = format!("{session:?}");
        assert!(rendered.contains("RoomSession"));
        assert!(rendered.contains(&room.id.to_string()));
    }

    #[tokio::test]
    async fn closed_room_rejects_mutations() {
        let store = MemoryRoomStore::new();
        let (session, _) = persisted_session(&store).await;

        session
            .mutate(RoomEvent::RoomClosed, |_| Ok(()))
            .await
            .unwrap();

        let err = session
            .mutate(RoomEvent::VotesRevealed, |_| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RoomClosed));
    }

    #[tokio::test]
    async fn failed_apply_leaves_state_untouched() {
        let store = MemoryRoomStore::new();
        let (session, _) = persisted_session(&store).await;

        let err = session
            .mutate(RoomEvent::VotesRevealed, |_| {
                Err::<(), _>(ServiceError::InvalidInput("nope".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let current = session.room().await;
        assert_eq!(current.version, 1);
        assert!(!current.votes_revealed);
    }

    #[tokio::test]
    async fn external_write_reaches_subscribers() {
        let store = MemoryRoomStore::new();
        let (session, room) = persisted_session(&store).await;
        let mut updates = session.updates();

        // Simulate another node winning a write at the next version.
        let mut external = room.clone();
        external.voting_prompt = "Checkout story".into();
        external.version = 2;
        store.save(external.into()).await.unwrap();

        timeout(Duration::from_secs(1), async {
            loop {
                updates.changed().await.unwrap();
                let update = updates.borrow_and_update().clone();
                if let SessionUpdate::Room(room) = update
                    && room.version == 2
                {
                    assert_eq!(room.voting_prompt, "Checkout story");
                    break;
                }
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn removal_terminates_the_session() {
        let store = MemoryRoomStore::new();
        let (session, room) = persisted_session(&store).await;
        let mut updates = session.updates();

        store.remove(room.id);

        timeout(Duration::from_secs(1), async {
            loop {
                updates.changed().await.unwrap();
                if matches!(*updates.borrow_and_update(), SessionUpdate::Terminated) {
                    break;
                }
            }
        })
        .await
        .unwrap();
    }
}
