//! Persistent cache of the local participant's identity.
//!
//! The cache lets a participant land back in their room after a reload
//! without re-joining. A corrupt payload is treated as absent and wiped so
//! the next load starts clean instead of failing forever.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::ParticipantRoleEntity;

/// Identity remembered between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredIdentity {
    /// Participant id inside the remembered room.
    pub participant_id: Uuid,
    /// Display name used at join time.
    pub name: String,
    /// Assigned color tag.
    pub color: String,
    /// Voter or observer.
    pub role: ParticipantRoleEntity,
    /// Room the participant belongs to.
    pub room_id: Uuid,
}

/// Key-value store for the local participant identity.
pub trait IdentityStore: Send + Sync {
    /// Persist the identity, replacing any previous one.
    fn save(&self, identity: &StoredIdentity) -> io::Result<()>;
    /// Load the persisted identity, or `None` when absent or unreadable.
    fn load(&self) -> Option<StoredIdentity>;
    /// Forget the persisted identity.
    fn clear(&self);
}

/// Identity store backed by a single JSON file on disk.
pub struct JsonFileIdentityStore {
    path: PathBuf,
}

impl JsonFileIdentityStore {
    /// Build a store over the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityStore for JsonFileIdentityStore {
    fn save(&self, identity: &StoredIdentity) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_vec_pretty(identity)?;
        fs::write(self.path(), payload)
    }

    fn load(&self) -> Option<StoredIdentity> {
        let contents = match fs::read_to_string(self.path()) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read identity cache");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(identity) => Some(identity),
            Err(err) => {
                // Self-heal: a corrupt payload is wiped, not propagated.
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "identity cache is corrupt; clearing it"
                );
                self.clear();
                None
            }
        }
    }

    fn clear(&self) {
        if let Err(err) = fs::remove_file(self.path())
            && err.kind() != io::ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), error = %err, "failed to clear identity cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_store() -> JsonFileIdentityStore {
        let path = std::env::temp_dir()
            .join(format!("identity-test-{}", Uuid::new_v4()))
            .join("identity.json");
        JsonFileIdentityStore::new(path)
    }

    fn identity() -> StoredIdentity {
        StoredIdentity {
            participant_id: Uuid::new_v4(),
            name: "Alice".into(),
            color: "#FFD54F".into(),
            role: ParticipantRoleEntity::Voter,
            room_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = scratch_store();
        let saved = identity();
        store.save(&saved).unwrap();
        assert_eq!(store.load(), Some(saved));
    }

    #[test]
    fn load_without_a_file_is_none() {
        let store = scratch_store();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn corrupt_payload_is_cleared_and_absent() {
        let store = scratch_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), b"{not json").unwrap();

        assert_eq!(store.load(), None);
        // The broken file is gone, so the next load is a clean miss.
        assert!(!store.path().exists());
    }

    #[test]
    fn clear_forgets_the_identity() {
        let store = scratch_store();
        store.save(&identity()).unwrap();
        store.clear();
        assert_eq!(store.load(), None);
    }
}
