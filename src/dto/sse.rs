use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::common::RoomSnapshot;

#[derive(Clone, Debug)]
/// Dispatched payload carried across an SSE stream.
pub struct ServerEvent {
    /// Optional SSE event name.
    pub event: Option<String>,
    /// Serialized data field.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the observed room.
    pub room_id: Uuid,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast whenever a confirmed change lands on the observed room.
pub struct RoomChangedEvent(pub RoomSnapshot);

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once when the observed room disappears; the stream ends after it.
pub struct RoomGoneEvent {
    /// Identifier of the room that disappeared.
    pub room_id: Uuid,
}
