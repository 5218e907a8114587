use std::time::SystemTime;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::dao::models::{
    CapturedVoteEntity, ParticipantEntity, ParticipantRoleEntity, RoomEntity, RoomStatusEntity,
    RoundRecordEntity,
};
use crate::state::state_machine::RoomPhase;

/// Role a participant plays inside a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantRole {
    /// Casts estimates and counts toward participation.
    Voter,
    /// Watches only.
    Observer,
}

/// Participant tracked during a room session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Stable identifier assigned at join time.
    pub id: Uuid,
    /// Sanitized display name.
    pub name: String,
    /// Current vote for the open round.
    pub vote: Option<String>,
    /// Color tag from the fixed palette.
    pub color: String,
    /// Voter or observer.
    pub role: ParticipantRole,
}

impl Participant {
    /// Whether this participant counts toward voting statistics.
    pub fn is_voter(&self) -> bool {
        self.role == ParticipantRole::Voter
    }
}

/// A vote captured into the archive of a finished round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedVote {
    /// The token that was cast.
    pub value: String,
    /// Display name at capture time.
    pub name: String,
    /// Color tag at capture time.
    pub color: String,
}

/// Immutable record of a completed round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundRecord {
    /// Round counter at archive time.
    pub number: u32,
    /// Prompt the round was estimating.
    pub prompt: String,
    /// Resolved score for the round.
    pub final_score: String,
    /// Votes keyed by participant id, in join order.
    pub votes: IndexMap<Uuid, CapturedVote>,
    /// Instant the round was archived.
    pub captured_at: SystemTime,
}

/// Runtime representation of a planning room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    /// Primary key; its hyphenated form is the shareable room code.
    pub id: Uuid,
    /// Participant id of the creator.
    pub owner_participant_id: Uuid,
    /// Display name of the creator.
    pub owner_name: String,
    /// Current round's description text.
    pub voting_prompt: String,
    /// Joined participants in join order.
    pub participants: Vec<Participant>,
    /// Whether the room has been closed.
    pub closed: bool,
    /// Whether votes are currently face-up.
    pub votes_revealed: bool,
    /// Round counter, starting at 1.
    pub current_round: u32,
    /// Archived rounds, append-only.
    pub round_history: Vec<RoundRecord>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Persistence version of the snapshot this state was built from.
    pub version: u64,
}

impl Room {
    /// Build a fresh room with its creator already seated.
    pub fn new(prompt: String, owner: Participant) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_participant_id: owner.id,
            owner_name: owner.name.clone(),
            voting_prompt: prompt,
            participants: vec![owner],
            closed: false,
            votes_revealed: false,
            current_round: 1,
            round_history: Vec::new(),
            created_at: SystemTime::now(),
            version: 0,
        }
    }

    /// Phase of the room as seen by the transition table.
    pub fn phase(&self) -> RoomPhase {
        if self.closed {
            RoomPhase::Closed
        } else {
            RoomPhase::Waiting {
                revealed: self.votes_revealed,
            }
        }
    }

    /// Find a participant by id.
    pub fn participant(&self, id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Find a participant by id, mutably.
    pub fn participant_mut(&mut self, id: Uuid) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    /// Whether the given participant id holds moderation authority.
    pub fn is_owner(&self, participant_id: Uuid) -> bool {
        self.owner_participant_id == participant_id
    }

    /// Votes cast in the open round, keyed by participant id in join order.
    /// Observers never appear here.
    pub fn current_votes(&self) -> IndexMap<Uuid, CapturedVote> {
        self.participants
            .iter()
            .filter(|p| p.is_voter())
            .filter_map(|p| {
                p.vote.as_ref().map(|value| {
                    (
                        p.id,
                        CapturedVote {
                            value: value.clone(),
                            name: p.name.clone(),
                            color: p.color.clone(),
                        },
                    )
                })
            })
            .collect()
    }

    /// Clear every participant's vote for a fresh round.
    pub fn clear_votes(&mut self) {
        for participant in &mut self.participants {
            participant.vote = None;
        }
    }

    /// Fold a transition-table outcome back into the room's flat fields.
    pub fn apply_phase(&mut self, phase: RoomPhase) {
        match phase {
            RoomPhase::Waiting { revealed } => {
                self.closed = false;
                self.votes_revealed = revealed;
            }
            RoomPhase::Closed => {
                self.closed = true;
            }
        }
    }

    /// Snapshot the open round into the history under the given final score.
    /// Leaves votes and the round counter untouched.
    pub fn capture_round(&mut self, final_score: String) {
        let record = RoundRecord {
            number: self.current_round,
            prompt: self.voting_prompt.clone(),
            final_score,
            votes: self.current_votes(),
            captured_at: SystemTime::now(),
        };
        self.round_history.push(record);
    }

    /// Archive the open round under the given final score, then reset votes
    /// and advance the counter.
    pub fn archive_round(&mut self, final_score: String, next_prompt: String) {
        self.capture_round(final_score);
        self.clear_votes();
        self.votes_revealed = false;
        self.current_round += 1;
        self.voting_prompt = next_prompt;
    }
}

impl From<ParticipantRoleEntity> for ParticipantRole {
    fn from(value: ParticipantRoleEntity) -> Self {
        match value {
            ParticipantRoleEntity::Voter => Self::Voter,
            ParticipantRoleEntity::Observer => Self::Observer,
        }
    }
}

impl From<ParticipantRole> for ParticipantRoleEntity {
    fn from(value: ParticipantRole) -> Self {
        match value {
            ParticipantRole::Voter => Self::Voter,
            ParticipantRole::Observer => Self::Observer,
        }
    }
}

impl From<ParticipantEntity> for Participant {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            vote: value.vote,
            color: value.color,
            role: value.role.into(),
        }
    }
}

impl From<Participant> for ParticipantEntity {
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

impl From<CapturedVoteEntity> for CapturedVote {
    fn from(value: CapturedVoteEntity) -> Self {
        Self {
            value: value.value,
            name: value.name,
            color: value.color,
        }
    }
}

impl From<CapturedVote> for CapturedVoteEntity {
    fn from(value: CapturedVote) -> Self {
        Self {
            value: value.value,
            name: value.name,
            color: value.color,
        }
    }
}

impl From<RoundRecordEntity> for RoundRecord {
    fn from(value: RoundRecordEntity) -> Self {
        Self {
            number: value.number,
            prompt: value.prompt,
            final_score: value.final_score,
            votes: value
                .votes
                .into_iter()
                .map(|(id, vote)| (id, vote.into()))
                .collect(),
            captured_at: value.captured_at,
        }
    }
}

impl From<RoundRecord> for RoundRecordEntity {
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
            captured_at: value.captured_at,
        }
    }
}

impl From<RoomEntity> for Room {
    fn from(value: RoomEntity) -> Self {
        Self {
            id: value.id,
            owner_participant_id: value.owner_participant_id,
            owner_name: value.owner_name,
            voting_prompt: value.voting_prompt,
            participants: value.participants.into_iter().map(Into::into).collect(),
            closed: value.status == RoomStatusEntity::Closed,
            votes_revealed: value.votes_revealed,
            current_round: value.current_round,
            round_history: value.round_history.into_iter().map(Into::into).collect(),
            created_at: value.created_at,
            version: value.version,
        }
    }
}

impl From<Room> for RoomEntity {
    fn from(value: Room) -> Self {
        Self {
            id: value.id,
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
            created_at: value.created_at,
            version: value.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voter(name: &str, vote: Option<&str>) -> Participant {
        Participant {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            vote: vote.map(str::to_owned),
            color: "#64B5F6".to_owned(),
            role: ParticipantRole::Voter,
        }
    }

    #[test]
    fn archive_resets_votes_and_advances_round() {
        let owner = voter("Alice", Some("5"));
        let mut room = Room::new("Login story".to_owned(), owner);
        room.participants.push(voter("Bob", Some("8")));
        room.votes_revealed = true;

        room.archive_round("5".to_owned(), "Checkout story".to_owned());

        assert_eq!(room.current_round, 2);
        assert_eq!(room.voting_prompt, "Checkout story");
        assert!(!room.votes_revealed);
        assert!(room.participants.iter().all(|p| p.vote.is_none()));

        let record = &room.round_history[0];
        assert_eq!(record.number, 1);
        assert_eq!(record.prompt, "Login story");
        assert_eq!(record.final_score, "5");
        assert_eq!(record.votes.len(), 2);
    }

    #[test]
    fn current_votes_skips_observers_and_abstainers() {
        let owner = voter("Alice", Some("3"));
        let mut room = Room::new("Story".to_owned(), owner);
        room.participants.push(voter("Bob", None));
        room.participants.push(Participant {
            role: ParticipantRole::Observer,
            ..voter("Carol", Some("8"))
        });

        let votes = room.current_votes();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes.values().next().unwrap().name, "Alice");
    }

    #[test]
    fn entity_round_trip_preserves_room() {
        let owner = voter("Alice", Some("13"));
        let mut room = Room::new("Story".to_owned(), owner);
        room.votes_revealed = true;
        room.archive_round("13".to_owned(), "Next story".to_owned());
        room.version = 4;

        let entity: RoomEntity = room.clone().into();
        let back: Room = entity.into();
        assert_eq!(back, room);
    }
}
