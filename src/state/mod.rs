/// Runtime room representation and entity conversions.
pub mod room;
/// Live per-room sessions with serialized mutations and update fan-out.
pub mod session;
/// Phase/event transition table shared by every room.
pub mod state_machine;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::room_store::RoomStore,
    error::ServiceError,
    services::identity_service::IdentityStore,
    state::session::RoomSession,
};

/// Shared handle over the application state.
pub type SharedState = Arc<AppState>;

/// Central application state storing the storage backend, live room sessions,
/// and the identity cache.
pub struct AppState {
    room_store: RwLock<Option<Arc<dyn RoomStore>>>,
    sessions: DashMap<Uuid, Arc<RoomSession>>,
    identities: Arc<dyn IdentityStore>,
    config: AppConfig,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, identities: Arc<dyn IdentityStore>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            room_store: RwLock::new(None),
            sessions: DashMap::new(),
            identities,
            config,
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current room store, if one is installed.
    pub async fn room_store(&self) -> Option<Arc<dyn RoomStore>> {
        let guard = self.room_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the room store or fail with a degraded-mode error.
    pub async fn require_room_store(&self) -> Result<Arc<dyn RoomStore>, ServiceError> {
        self.room_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new room store implementation and leave degraded mode.
    pub async fn install_room_store(&self, store: Arc<dyn RoomStore>) {
        {
            let mut guard = self.room_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current room store and enter degraded mode.
    pub async fn clear_room_store(&self) {
        {
            let mut guard = self.room_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.room_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        if self.is_degraded().await == value {
            return;
        }

        let _ = self.degraded.send(value);
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Persistent identity cache.
    pub fn identities(&self) -> &Arc<dyn IdentityStore> {
        &self.identities
    }

    /// Look up the live session for a room, if one is open in this process.
    pub fn session(&self, room_id: Uuid) -> Option<Arc<RoomSession>> {
        self.sessions.get(&room_id).map(|entry| entry.value().clone())
    }

    /// Register a live session so later requests for the room reuse it.
    /// Returns the canonical session, which is the already registered one
    /// when two callers race to open the same room.
    pub fn register_session(&self, session: Arc<RoomSession>) -> Arc<RoomSession> {
        self.sessions
            .entry(session.room_id())
            .or_insert(session)
            .clone()
    }

    /// Drop the live session for a room, stopping its storage follower.
    pub async fn evict_session(&self, room_id: Uuid) {
        if let Some((_, session)) = self.sessions.remove(&room_id) {
            session.shutdown().await;
        }
    }
}
