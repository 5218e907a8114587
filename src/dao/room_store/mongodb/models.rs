//! BSON document shapes and entity conversions.
//!
//! Timestamps live as BSON datetimes and version counters as `i64` inside
//! MongoDB; both are normalized back to the entity types here so the rest of
//! the crate never sees store-specific representations.

use indexmap::IndexMap;
use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::dao::models::{
    CapturedVoteEntity, ParticipantEntity, RoomEntity, RoomStatusEntity, RoundRecordEntity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    owner_participant_id: Uuid,
    owner_name: String,
    voting_prompt: String,
    participants: Vec<ParticipantEntity>,
    status: RoomStatusEntity,
    votes_revealed: bool,
    current_round: u32,
    round_history: Vec<MongoRoundRecord>,
    created_at: DateTime,
    version: i64,
}

/// Round record with string vote keys (BSON maps cannot key on binary UUIDs)
/// and a BSON datetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoundRecord {
    number: u32,
    prompt: String,
    final_score: String,
    votes: IndexMap<String, CapturedVoteEntity>,
    captured_at: DateTime,
}

impl From<RoundRecordEntity> for MongoRoundRecord {
    fn from(value: RoundRecordEntity) -> Self {
        Self {
            number: value.number,
            prompt: value.prompt,
            final_score: value.final_score,
            votes: value
                .votes
                .into_iter()
                .map(|(id, vote)| (id.to_string(), vote))
                .collect(),
            captured_at: DateTime::from_system_time(value.captured_at),
        }
    }
}

impl MongoRoundRecord {
    fn into_entity(self, room_id: Uuid) -> Result<RoundRecordEntity, MongoDaoError> {
        let votes = self
            .votes
            .into_iter()
            .map(|(key, vote)| {
                Uuid::parse_str(&key)
                    .map(|id| (id, vote))
                    .map_err(|_| MongoDaoError::DecodeRoom {
                        id: room_id,
                        detail: format!("round {} vote key `{key}` is not a UUID", self.number),
                    })
            })
            .collect::<Result<IndexMap<_, _>, _>>()?;

        Ok(RoundRecordEntity {
            number: self.number,
            prompt: self.prompt,
            final_score: self.final_score,
            votes,
            captured_at: self.captured_at.to_system_time(),
        })
    }
}

impl From<RoomEntity> for MongoRoomDocument {
    fn from(value: RoomEntity) -> Self {
        Self {
            id: value.id,
            owner_participant_id: value.owner_participant_id,
            owner_name: value.owner_name,
            voting_prompt: value.voting_prompt,
            participants: value.participants,
            status: value.status,
            votes_revealed: value.votes_revealed,
            current_round: value.current_round,
            round_history: value.round_history.into_iter().map(Into::into).collect(),
            created_at: DateTime::from_system_time(value.created_at),
            version: value.version as i64,
        }
    }
}

impl TryFrom<MongoRoomDocument> for RoomEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoRoomDocument) -> Result<Self, Self::Error> {
        let room_id = value.id;
        let round_history = value
            .round_history
            .into_iter()
            .map(|record| record.into_entity(room_id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: value.id,
            owner_participant_id: value.owner_participant_id,
            owner_name: value.owner_name,
            voting_prompt: value.voting_prompt,
            participants: value.participants,
            status: value.status,
            votes_revealed: value.votes_revealed,
            current_round: value.current_round,
            round_history,
            created_at: value.created_at.to_system_time(),
            version: value.version.max(0) as u64,
        })
    }
}

fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

/// `_id` filter document for a room.
pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}

/// `_id` + expected-version filter used by the optimistic-concurrency save.
pub fn doc_id_at_version(id: Uuid, version: u64) -> Document {
    doc! {"_id": uuid_as_binary(id), "version": version as i64}
}

/// Change-stream filter matching a single room document.
pub fn watch_filter(id: Uuid) -> Document {
    doc! {"$match": {"documentKey._id": uuid_as_binary(id)}}
}
