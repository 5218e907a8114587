use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::ParticipantRoleEntity,
    dto::{
        common::RoomSnapshot,
        validation::{check_final_score, check_name, check_prompt, validate_vote},
    },
    services::vote_analytics::RoundAnalytics,
};

fn default_role() -> ParticipantRoleEntity {
    ParticipantRoleEntity::Voter
}

/// Payload used to open a brand-new room.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoomRequest {
    /// Display name of the creator.
    pub owner_name: String,
    /// Description of the first round.
    pub prompt: String,
    /// Role the creator takes; voters estimate, observers watch.
    #[serde(default = "default_role")]
    pub role: ParticipantRoleEntity,
}

impl Validate for CreateRoomRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = check_name(&self.owner_name) {
            errors.add("owner_name", e);
        }
        if let Err(e) = check_prompt(&self.prompt) {
            errors.add("prompt", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload used to join an existing room.
#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinRoomRequest {
    /// Display name of the newcomer.
    pub name: String,
    /// Role the newcomer takes.
    #[serde(default = "default_role")]
    pub role: ParticipantRoleEntity,
}

impl Validate for JoinRoomRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = check_name(&self.name) {
            errors.add("name", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload used to cast, change, or clear a vote.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CastVoteRequest {
    /// The voter acting on their own ballot.
    pub participant_id: Uuid,
    /// Deck token, or `null` to clear the ballot.
    #[serde(default)]
    pub vote: Option<String>,
}

impl Validate for CastVoteRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_vote(self.vote.as_deref()) {
            errors.add("vote", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload used to archive the open round and move to the next one.
#[derive(Debug, Deserialize, ToSchema)]
pub struct NewRoundRequest {
    /// Description of the next round.
    pub prompt: String,
    /// Explicit final score for the closing round. Empty lets the computed
    /// majority stand; ties always require an explicit value.
    #[serde(default)]
    pub final_score: String,
}

impl Validate for NewRoundRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = check_prompt(&self.prompt) {
            errors.add("prompt", e);
        }
        if let Err(e) = check_final_score(&self.final_score) {
            errors.add("final_score", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload used to close a room for good.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CloseRoomRequest {
    /// Explicit final score for the last revealed round, when any.
    #[serde(default)]
    pub final_score: String,
}

impl Validate for CloseRoomRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = check_final_score(&self.final_score) {
            errors.add("final_score", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Room state plus the caller's participant id, returned on create and join.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomMembershipResponse {
    /// The room after the operation.
    pub room: RoomSnapshot,
    /// Identifier assigned to the caller inside the room.
    pub participant_id: Uuid,
}

/// Query parameters for the ownership check.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OwnershipQuery {
    /// Participant id to test for moderation authority.
    pub participant_id: Uuid,
}

/// Verdict of the ownership check.
#[derive(Debug, Serialize, ToSchema)]
pub struct OwnershipResponse {
    /// Whether the participant owns the room.
    pub owner: bool,
}

/// Voting statistics for the open round.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundAnalyticsResponse {
    /// Vote counts per token, in first-counted order.
    #[schema(value_type = Object)]
    pub histogram: IndexMap<String, usize>,
    /// Whether the top count is shared by more than one token.
    pub tied: bool,
    /// Tokens sharing the top count.
    pub tied_tokens: Vec<String>,
    /// Dominant token, or `-` when nobody voted.
    pub majority_token: String,
    /// Votes behind the dominant token.
    pub majority_count: usize,
    /// Total votes cast.
    pub total_votes: usize,
    /// Share of voters who have cast a vote, as a percentage.
    pub participation_percent: f64,
    /// Score the round could be archived under without an override; empty
    /// when tied, special, or nobody voted.
    pub suggested_score: String,
}

impl From<RoundAnalytics> for RoundAnalyticsResponse {
    fn from(value: RoundAnalytics) -> Self {
        Self {
            histogram: value.histogram,
            tied: value.tie.tied,
            tied_tokens: value.tie.tokens,
            majority_token: value.majority.token,
            majority_count: value.majority.count,
            total_votes: value.majority.total,
            participation_percent: value.participation_percent,
            suggested_score: value.suggested_score,
        }
    }
}
