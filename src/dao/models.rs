//! Persisted document shapes shared by every storage backend.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of a persisted room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatusEntity {
    /// The room accepts joins, votes, and moderation.
    Waiting,
    /// Terminal: the room accepts no further writes.
    Closed,
}

/// Role a participant plays inside a room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRoleEntity {
    /// Casts estimates and counts toward participation.
    Voter,
    /// Watches only; never counted in voting statistics.
    Observer,
}

/// A joined participant as stored inside the room document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Stable identifier generated at join time, unique within the room.
    pub id: Uuid,
    /// Sanitized display name.
    pub name: String,
    /// Current vote, `None` while no card has been played.
    pub vote: Option<String>,
    /// Presentation tag assigned from the fixed palette at join time.
    pub color: String,
    /// Voter or observer.
    pub role: ParticipantRoleEntity,
}

/// A single archived vote inside a round record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapturedVoteEntity {
    /// The token that was cast.
    pub value: String,
    /// Display name at capture time.
    pub name: String,
    /// Color tag at capture time.
    pub color: String,
}

/// Immutable snapshot of a completed round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundRecordEntity {
    /// Round counter at archive time, starting at 1.
    pub number: u32,
    /// The prompt the round was estimating.
    pub prompt: String,
    /// Resolved score: an explicit override or the computed majority.
    pub final_score: String,
    /// Votes keyed by participant id; only participants who had cast a vote
    /// at capture time appear here. Insertion order is join order.
    pub votes: IndexMap<Uuid, CapturedVoteEntity>,
    /// Instant the round was archived.
    pub captured_at: SystemTime,
}

/// Aggregate room document persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Primary key; its hyphenated form doubles as the shareable room code.
    pub id: Uuid,
    /// Participant id of the creator; moderation authority key.
    pub owner_participant_id: Uuid,
    /// Display name of the creator (presentation only).
    pub owner_name: String,
    /// Current round's description text.
    pub voting_prompt: String,
    /// Joined participants in join order.
    pub participants: Vec<ParticipantEntity>,
    /// Waiting or closed.
    pub status: RoomStatusEntity,
    /// Whether votes are currently exposed to everyone.
    pub votes_revealed: bool,
    /// Monotonically increasing round counter, starting at 1.
    pub current_round: u32,
    /// Archived rounds, append-only.
    pub round_history: Vec<RoundRecordEntity>,
    /// Creation timestamp, set once.
    pub created_at: SystemTime,
    /// Optimistic-concurrency counter; bumped on every successful save.
    pub version: u64,
}
