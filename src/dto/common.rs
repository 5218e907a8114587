use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{ParticipantRoleEntity, RoomStatusEntity},
    dto::format_system_time,
    state::room::{CapturedVote, Participant, Room, RoundRecord},
};

/// Public projection of a participant exposed to REST/SSE clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParticipantSnapshot {
    /// Stable participant identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Current vote; `None` until a card has been played.
    pub vote: Option<String>,
    /// Color tag from the palette.
    pub color: String,
    /// Voter or observer.
    pub role: ParticipantRoleEntity,
}

impl From<Participant> for ParticipantSnapshot {
    fn from(value: Participant) -> Self {
        Self {
            id: value.id,
            name: value.name,
            vote: value.vote,
            color: value.color,
            role: value.role.into(),
        }
    }
}

/// One archived vote inside a round record.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CapturedVoteSnapshot {
    /// The token that was cast.
    pub value: String,
    /// Display name at capture time.
    pub name: String,
    /// Color tag at capture time.
    pub color: String,
}

impl From<CapturedVote> for CapturedVoteSnapshot {
    fn from(value: CapturedVote) -> Self {
        Self {
            value: value.value,
            name: value.name,
            color: value.color,
        }
    }
}

/// Projection of an archived round.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundRecordSnapshot {
    /// Round counter at archive time.
    pub number: u32,
    /// Prompt the round was estimating.
    pub prompt: String,
    /// Resolved score for the round.
    pub final_score: String,
    /// Archived votes keyed by participant id.
    #[schema(value_type = Object)]
    pub votes: IndexMap<Uuid, CapturedVoteSnapshot>,
    /// RFC 3339 timestamp of the archive instant.
    pub captured_at: String,
}

impl From<RoundRecord> for RoundRecordSnapshot {
    fn from(value: RoundRecord) -> Self {
        Self {
            number: value.number,
            prompt: value.prompt,
            final_score: value.final_score,
            votes: value
                .votes
                .into_iter()
                .map(|(id, vote)| (id, vote.into()))
                .collect(),
            captured_at: format_system_time(value.captured_at),
        }
    }
}

/// Full read-only projection of a room, published on every confirmed change.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSnapshot {
    /// Room identifier.
    pub id: Uuid,
    /// Shareable room code (the hyphenated identifier).
    pub code: String,
    /// Participant id holding moderation authority.
    pub owner_participant_id: Uuid,
    /// Display name of the creator.
    pub owner_name: String,
    /// Current round's description text.
    pub voting_prompt: String,
    /// Participants in join order.
    pub participants: Vec<ParticipantSnapshot>,
    /// Waiting or closed.
    pub status: RoomStatusEntity,
    /// Whether votes are currently face-up.
    pub votes_revealed: bool,
    /// Round counter, starting at 1.
    pub current_round: u32,
    /// Archived rounds in completion order.
    pub round_history: Vec<RoundRecordSnapshot>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Persistence version of this snapshot.
    pub version: u64,
}

impl From<Room> for RoomSnapshot {
    fn from(value: Room) -> Self {
        Self {
            id: value.id,
            code: value.id.hyphenated().to_string(),
            owner_participant_id: value.owner_participant_id,
            owner_name: value.owner_name,
            voting_prompt: value.voting_prompt,
            participants: value.participants.into_iter().map(Into::into).collect(),
            status: if value.closed {
                RoomStatusEntity::Closed
            } else {
                RoomStatusEntity::Waiting
            },
            votes_revealed: value.votes_revealed,
            current_round: value.current_round,
            round_history: value.round_history.into_iter().map(Into::into).collect(),
            created_at: format_system_time(value.created_at),
            version: value.version,
        }
    }
}
