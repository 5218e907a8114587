//! Room lifecycle operations: create, join, vote, reveal, round management,
//! and moderation. Every mutation is validated, checked against the
//! transition table, and persisted before it is visible to anyone.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        common::RoomSnapshot,
        room::{
            CastVoteRequest, CloseRoomRequest, CreateRoomRequest, JoinRoomRequest, NewRoundRequest,
            RoomMembershipResponse,
        },
        validation::{
            validate_final_score, validate_name, validate_prompt, validate_room_code, validate_vote,
        },
    },
    error::ServiceError,
    services::{
        identity_service::StoredIdentity,
        vote_analytics::{self, RoundAnalytics},
    },
    state::{
        SharedState,
        room::{Participant, Room},
        session::RoomSession,
        state_machine::RoomEvent,
    },
};

/// Open a brand-new room with its creator already seated.
pub async fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
) -> Result<RoomMembershipResponse, ServiceError> {
    let store = state.require_room_store().await?;

    let owner_name = validate_name(&request.owner_name)?;
    let prompt = validate_prompt(&request.prompt)?;

    let owner = Participant {
        id: Uuid::new_v4(),
        name: owner_name,
        vote: None,
        color: state.config().random_color(),
        role: request.role.into(),
    };

    let mut room = Room::new(prompt, owner.clone());
    room.version = 1;

    store.save(room.clone().into()).await?;

    let session = state.register_session(RoomSession::open(store, room.clone()));
    remember_identity(state, room.id, &owner);

    Ok(RoomMembershipResponse {
        room: session.room().await.into(),
        participant_id: owner.id,
    })
}

/// Join an existing room by its shareable code.
pub async fn join_room(
    state: &SharedState,
    code: &str,
    request: JoinRoomRequest,
) -> Result<RoomMembershipResponse, ServiceError> {
    let room_id = room_id_from_code(code)?;
    let name = validate_name(&request.name)?;

    let participant = Participant {
        id: Uuid::new_v4(),
        name,
        vote: None,
        color: state.config().random_color(),
        role: request.role.into(),
    };
    let joined = participant.clone();

    let session = session_for(state, room_id).await?;
    session
        .mutate(
            RoomEvent::ParticipantJoined {
                participant_id: participant.id,
            },
            move |draft| {
                draft.participants.push(participant);
                Ok(())
            },
        )
        .await?;

    remember_identity(state, room_id, &joined);

    Ok(RoomMembershipResponse {
        room: session.room().await.into(),
        participant_id: joined.id,
    })
}

/// Open a live session over a room so its confirmed updates can be observed.
pub async fn observe_room(
    state: &SharedState,
    code: &str,
) -> Result<Arc<RoomSession>, ServiceError> {
    if code.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "room code must not be empty".into(),
        ));
    }

    let room_id = room_id_from_code(code)?;
    session_for(state, room_id).await
}

/// Fetch the current state of a room.
pub async fn room_snapshot(
    state: &SharedState,
    room_id: Uuid,
) -> Result<RoomSnapshot, ServiceError> {
    let session = session_for(state, room_id).await?;
    Ok(session.room().await.into())
}

/// Cast, change, or clear a participant's vote for the open round.
pub async fn cast_vote(
    state: &SharedState,
    room_id: Uuid,
    request: CastVoteRequest,
) -> Result<RoomSnapshot, ServiceError> {
    validate_vote(request.vote.as_deref())?;
    let participant_id = request.participant_id;
    let vote = request.vote;

    let session = session_for(state, room_id).await?;
    session
        .mutate(RoomEvent::VoteCast { participant_id }, move |draft| {
            let Some(participant) = draft.participant_mut(participant_id) else {
                return Err(ServiceError::ParticipantNotFound(participant_id.to_string()));
            };
            if !participant.is_voter() {
                return Err(ServiceError::InvalidState("observers cannot vote".into()));
            }
            participant.vote = vote;
            Ok(())
        })
        .await?;

    Ok(session.room().await.into())
}

/// Turn all votes face-up. Calling it on an already revealed room is a no-op.
pub async fn reveal_votes(
    state: &SharedState,
    room_id: Uuid,
) -> Result<RoomSnapshot, ServiceError> {
    let session = session_for(state, room_id).await?;
    let room = session
        .mutate_idempotent(RoomEvent::VotesRevealed, |room| room.votes_revealed, |_| {
            Ok(())
        })
        .await?;
    Ok(room.into())
}

/// Turn votes back face-down, discarding the open round's votes. Calling it
/// on an already hidden room is a no-op.
pub async fn hide_votes(state: &SharedState, room_id: Uuid) -> Result<RoomSnapshot, ServiceError> {
    let session = session_for(state, room_id).await?;
    let room = session
        .mutate_idempotent(
            RoomEvent::VotesHidden,
            |room| !room.votes_revealed,
            |draft| {
                draft.clear_votes();
                Ok(())
            },
        )
        .await?;
    Ok(room.into())
}

/// Advance to the next round. When votes are revealed the closing round is
/// archived first under the resolved final score.
pub async fn start_new_round(
    state: &SharedState,
    room_id: Uuid,
    request: NewRoundRequest,
) -> Result<RoomSnapshot, ServiceError> {
    let prompt = validate_prompt(&request.prompt)?;
    let score_override = validate_final_score(&request.final_score)?;

    let session = session_for(state, room_id).await?;
    session
        .mutate(RoomEvent::RoundStarted, move |draft| {
            if draft.votes_revealed {
                let final_score = resolve_final_score(draft, &score_override)?;
                draft.archive_round(final_score, prompt);
            } else {
                draft.clear_votes();
                draft.current_round += 1;
                draft.voting_prompt = prompt;
            }
            Ok(())
        })
        .await?;

    Ok(session.room().await.into())
}

/// Close the room for good. When votes are revealed the last round is
/// archived first. Closing an already closed room is a no-op.
pub async fn close_room(
    state: &SharedState,
    room_id: Uuid,
    request: CloseRoomRequest,
) -> Result<RoomSnapshot, ServiceError> {
    let score_override = validate_final_score(&request.final_score)?;

    let session = session_for(state, room_id).await?;
    let room = session
        .mutate_idempotent(
            RoomEvent::RoomClosed,
            |room| room.closed,
            move |draft| {
                if draft.votes_revealed {
                    let final_score = resolve_final_score(draft, &score_override)?;
                    draft.capture_round(final_score);
                }
                Ok(())
            },
        )
        .await?;

    Ok(room.into())
}

/// Remove a participant from the room. The owner cannot be removed.
pub async fn remove_participant(
    state: &SharedState,
    room_id: Uuid,
    participant_id: Uuid,
) -> Result<RoomSnapshot, ServiceError> {
    let session = session_for(state, room_id).await?;
    session
        .mutate(
            RoomEvent::ParticipantRemoved { participant_id },
            move |draft| {
                if draft.is_owner(participant_id) {
                    return Err(ServiceError::Forbidden(
                        "the room owner cannot be removed".into(),
                    ));
                }
                let Some(index) = draft
                    .participants
                    .iter()
                    .position(|p| p.id == participant_id)
                else {
                    return Err(ServiceError::ParticipantNotFound(participant_id.to_string()));
                };
                draft.participants.remove(index);
                Ok(())
            },
        )
        .await?;

    Ok(session.room().await.into())
}

/// Whether the participant holds moderation authority over the room.
/// A room that is not loaded in this process simply answers `false`.
pub async fn is_owner(state: &SharedState, room_id: Uuid, participant_id: Uuid) -> bool {
    match state.session(room_id) {
        Some(session) => session.room().await.is_owner(participant_id),
        None => false,
    }
}

/// Voting statistics for the room's open round.
pub async fn round_analytics(
    state: &SharedState,
    room_id: Uuid,
) -> Result<RoundAnalytics, ServiceError> {
    let session = session_for(state, room_id).await?;
    let room = session.room().await;
    Ok(vote_analytics::round_analytics(&room.participants))
}

/// Resolve the score a round is archived under: an explicit override always
/// wins; otherwise the computed majority stands, and a tie is an error the
/// caller must settle with an override.
fn resolve_final_score(room: &Room, score_override: &str) -> Result<String, ServiceError> {
    if !score_override.is_empty() {
        return Ok(score_override.to_owned());
    }

    let tie = vote_analytics::tie_check(&room.participants);
    if tie.tied {
        return Err(ServiceError::InvalidState(
            "tied votes require an explicit final score".into(),
        ));
    }

    Ok(vote_analytics::majority(&room.participants).token)
}

/// Reuse the live session for a room or open one from the store.
async fn session_for(
    state: &SharedState,
    room_id: Uuid,
) -> Result<Arc<RoomSession>, ServiceError> {
    if let Some(session) = state.session(room_id) {
        return Ok(session);
    }

    let store = state.require_room_store().await?;
    let Some(entity) = store.find(room_id).await? else {
        return Err(ServiceError::NotFound(format!("room `{room_id}` not found")));
    };

    let opened = RoomSession::open(store, entity.into());
    let canonical = state.register_session(opened.clone());
    if !Arc::ptr_eq(&opened, &canonical) {
        opened.shutdown().await;
    }
    Ok(canonical)
}

fn room_id_from_code(code: &str) -> Result<Uuid, ServiceError> {
    let code = validate_room_code(code)?;
    Uuid::parse_str(&code)
        .map_err(|_| ServiceError::NotFound(format!("room `{code}` not found")))
}

fn remember_identity(state: &SharedState, room_id: Uuid, participant: &Participant) {
    let identity = StoredIdentity {
        participant_id: participant.id,
        name: participant.name.clone(),
        color: participant.color.clone(),
        role: participant.role.into(),
        room_id,
    };

    if let Err(err) = state.identities().save(&identity) {
        warn!(error = %err, "failed to persist participant identity");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::ParticipantRoleEntity,
            room_store::memory::MemoryRoomStore,
        },
        services::{identity_service::JsonFileIdentityStore, vote_analytics::vote_histogram},
        state::{AppState, session::SessionUpdate},
    };
    use std::time::Duration;
    use tokio::time::timeout;

    async fn test_state() -> SharedState {
        let identity_path = std::env::temp_dir()
            .join(format!("room-service-test-{}", Uuid::new_v4()))
            .join("identity.json");
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(JsonFileIdentityStore::new(identity_path)),
        );
        state
            .install_room_store(Arc::new(MemoryRoomStore::new()))
            .await;
        state
    }

    fn create_request(owner: &str) -> CreateRoomRequest {
        CreateRoomRequest {
            owner_name: owner.to_owned(),
            prompt: "Login story".to_owned(),
            role: ParticipantRoleEntity::Voter,
        }
    }

    fn join_request(name: &str) -> JoinRoomRequest {
        JoinRoomRequest {
            name: name.to_owned(),
            role: ParticipantRoleEntity::Voter,
        }
    }

    fn vote(participant_id: Uuid, token: Option<&str>) -> CastVoteRequest {
        CastVoteRequest {
            participant_id,
            vote: token.map(str::to_owned),
        }
    }

    async fn room_with_two_voters(state: &SharedState) -> (Uuid, Uuid, Uuid) {
        let created = create_room(state, create_request("Alice")).await.unwrap();
        let room_id = created.room.id;
        let joined = join_room(state, &created.room.code, join_request("Bob"))
            .await
            .unwrap();
        (room_id, created.participant_id, joined.participant_id)
    }

    #[tokio::test]
    async fn create_room_seats_exactly_the_owner() {
        let state = test_state().await;
        let created = create_room(&state, create_request("Alice")).await.unwrap();

        assert_eq!(created.room.participants.len(), 1);
        assert_eq!(created.room.participants[0].name, "Alice");
        assert_eq!(created.room.owner_participant_id, created.participant_id);
        assert!(!created.room.votes_revealed);
        assert_eq!(created.room.current_round, 1);
        assert_eq!(created.room.version, 1);
        assert!(created.room.round_history.is_empty());
    }

    #[tokio::test]
    async fn create_room_rejects_injection_in_the_name() {
        let state = test_state().await;
        let err = create_room(&state, create_request("<script>alert(1)</script>"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn create_room_remembers_the_owner_identity() {
        let state = test_state().await;
        let created = create_room(&state, create_request("Alice")).await.unwrap();

        let identity = state.identities().load().unwrap();
        assert_eq!(identity.participant_id, created.participant_id);
        assert_eq!(identity.room_id, created.room.id);
        assert_eq!(identity.name, "Alice");
    }

    #[tokio::test]
    async fn join_room_appends_a_fresh_participant() {
        let state = test_state().await;
        let created = create_room(&state, create_request("Alice")).await.unwrap();

        let joined = join_room(&state, &created.room.code, join_request("Bob"))
            .await
            .unwrap();

        assert_eq!(joined.room.participants.len(), 2);
        assert_ne!(joined.participant_id, created.participant_id);
        let bob = &joined.room.participants[1];
        assert_eq!(bob.name, "Bob");
        assert!(bob.vote.is_none());
    }

    #[tokio::test]
    async fn join_unknown_room_is_not_found() {
        let state = test_state().await;
        let code = Uuid::new_v4().hyphenated().to_string();
        let err = join_room(&state, &code, join_request("Bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn join_closed_room_is_rejected() {
        let state = test_state().await;
        let created = create_room(&state, create_request("Alice")).await.unwrap();
        close_room(&state, created.room.id, CloseRoomRequest::default())
            .await
            .unwrap();

        let err = join_room(&state, &created.room.code, join_request("Bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RoomClosed));
    }

    #[tokio::test]
    async fn cast_vote_updates_the_participant() {
        let state = test_state().await;
        let (room_id, alice, _) = room_with_two_voters(&state).await;

        let snapshot = cast_vote(&state, room_id, vote(alice, Some("5")))
            .await
            .unwrap();
        let participant = snapshot
            .participants
            .iter()
            .find(|p| p.id == alice)
            .unwrap();
        assert_eq!(participant.vote.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn cast_vote_rejects_unknown_participant_and_bad_token() {
        let state = test_state().await;
        let (room_id, alice, _) = room_with_two_voters(&state).await;

        let err = cast_vote(&state, room_id, vote(Uuid::new_v4(), Some("5")))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ParticipantNotFound(_)));

        let err = cast_vote(&state, room_id, vote(alice, Some("42")))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn cast_vote_is_rejected_while_revealed() {
        let state = test_state().await;
        let (room_id, alice, _) = room_with_two_voters(&state).await;
        reveal_votes(&state, room_id).await.unwrap();

        let err = cast_vote(&state, room_id, vote(alice, Some("5")))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn reveal_is_idempotent() {
        let state = test_state().await;
        let (room_id, _, _) = room_with_two_voters(&state).await;

        let first = reveal_votes(&state, room_id).await.unwrap();
        assert!(first.votes_revealed);
        let second = reveal_votes(&state, room_id).await.unwrap();
        assert!(second.votes_revealed);
        assert_eq!(second.version, first.version);
    }

    #[tokio::test]
    async fn racing_reveals_are_both_no_op_safe() {
        let state = test_state().await;
        let (room_id, _, _) = room_with_two_voters(&state).await;

        // Whichever call loses the race must see the revealed state instead
        // of tripping over an illegal transition.
        let (first, second) = tokio::join!(
            reveal_votes(&state, room_id),
            reveal_votes(&state, room_id)
        );
        let first = first.unwrap();
        let second = second.unwrap();
        assert!(first.votes_revealed);
        assert!(second.votes_revealed);
        assert_eq!(first.version, second.version);
    }

    #[tokio::test]
    async fn hide_clears_every_vote() {
        let state = test_state().await;
        let (room_id, alice, bob) = room_with_two_voters(&state).await;
        cast_vote(&state, room_id, vote(alice, Some("5")))
            .await
            .unwrap();
        cast_vote(&state, room_id, vote(bob, Some("8")))
            .await
            .unwrap();
        reveal_votes(&state, room_id).await.unwrap();

        hide_votes(&state, room_id).await.unwrap();

        let session = state.session(room_id).unwrap();
        let room = session.room().await;
        assert!(!room.votes_revealed);
        assert!(vote_histogram(&room.participants).is_empty());
    }

    #[tokio::test]
    async fn new_round_archives_only_when_revealed() {
        let state = test_state().await;
        let (room_id, alice, bob) = room_with_two_voters(&state).await;
        cast_vote(&state, room_id, vote(alice, Some("5")))
            .await
            .unwrap();
        cast_vote(&state, room_id, vote(bob, Some("5")))
            .await
            .unwrap();
        reveal_votes(&state, room_id).await.unwrap();

        let snapshot = start_new_round(
            &state,
            room_id,
            NewRoundRequest {
                prompt: "Checkout story".to_owned(),
                final_score: String::new(),
            },
        )
        .await
        .unwrap();

        assert_eq!(snapshot.current_round, 2);
        assert_eq!(snapshot.round_history.len(), 1);
        assert_eq!(snapshot.round_history[0].final_score, "5");
        assert_eq!(snapshot.voting_prompt, "Checkout story");

        // Second call with votes hidden advances the counter without
        // archiving anything.
        let snapshot = start_new_round(
            &state,
            room_id,
            NewRoundRequest {
                prompt: "Search story".to_owned(),
                final_score: String::new(),
            },
        )
        .await
        .unwrap();
        assert_eq!(snapshot.current_round, 3);
        assert_eq!(snapshot.round_history.len(), 1);
    }

    #[tokio::test]
    async fn tied_round_requires_an_explicit_score() {
        let state = test_state().await;
        let (room_id, alice, bob) = room_with_two_voters(&state).await;
        cast_vote(&state, room_id, vote(alice, Some("5")))
            .await
            .unwrap();
        cast_vote(&state, room_id, vote(bob, Some("8")))
            .await
            .unwrap();
        reveal_votes(&state, room_id).await.unwrap();

        let err = start_new_round(
            &state,
            room_id,
            NewRoundRequest {
                prompt: "Checkout story".to_owned(),
                final_score: String::new(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        // An explicit override settles the tie.
        let snapshot = start_new_round(
            &state,
            room_id,
            NewRoundRequest {
                prompt: "Checkout story".to_owned(),
                final_score: "6.5".to_owned(),
            },
        )
        .await
        .unwrap();
        assert_eq!(snapshot.round_history[0].final_score, "6.5");
    }

    #[tokio::test]
    async fn close_room_is_idempotent_and_archives_once() {
        let state = test_state().await;
        let (room_id, alice, _) = room_with_two_voters(&state).await;
        cast_vote(&state, room_id, vote(alice, Some("13")))
            .await
            .unwrap();
        reveal_votes(&state, room_id).await.unwrap();

        let first = close_room(&state, room_id, CloseRoomRequest::default())
            .await
            .unwrap();
        assert_eq!(first.round_history.len(), 1);
        assert_eq!(first.round_history[0].final_score, "13");

        let second = close_room(&state, room_id, CloseRoomRequest::default())
            .await
            .unwrap();
        assert_eq!(second.round_history.len(), 1);
        assert_eq!(second.version, first.version);
    }

    #[tokio::test]
    async fn removed_participant_vanishes_from_the_next_snapshot() {
        let state = test_state().await;
        let (room_id, _, bob) = room_with_two_voters(&state).await;

        let session = state.session(room_id).unwrap();
        let mut updates = session.updates();
        updates.mark_unchanged();

        remove_participant(&state, room_id, bob).await.unwrap();

        timeout(Duration::from_secs(1), async {
            loop {
                updates.changed().await.unwrap();
                let update = updates.borrow_and_update().clone();
                if let SessionUpdate::Room(room) = update
                    && room.participant(bob).is_none()
                {
                    break;
                }
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn owner_cannot_be_removed() {
        let state = test_state().await;
        let (room_id, alice, _) = room_with_two_voters(&state).await;

        let err = remove_participant(&state, room_id, alice).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn removing_a_stranger_is_not_found() {
        let state = test_state().await;
        let (room_id, _, _) = room_with_two_voters(&state).await;

        let err = remove_participant(&state, room_id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ParticipantNotFound(_)));
    }

    #[tokio::test]
    async fn ownership_check_is_a_pure_read() {
        let state = test_state().await;
        let (room_id, alice, bob) = room_with_two_voters(&state).await;

        assert!(is_owner(&state, room_id, alice).await);
        assert!(!is_owner(&state, room_id, bob).await);
        // Unknown rooms answer false instead of failing.
        assert!(!is_owner(&state, Uuid::new_v4(), alice).await);
    }

    #[tokio::test]
    async fn observe_room_fails_fast_on_an_empty_code() {
        let state = test_state().await;
        let err = observe_room(&state, "  ").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn analytics_follow_the_current_votes() {
        let state = test_state().await;
        let (room_id, alice, bob) = room_with_two_voters(&state).await;
        cast_vote(&state, room_id, vote(alice, Some("5")))
            .await
            .unwrap();
        cast_vote(&state, room_id, vote(bob, Some("5")))
            .await
            .unwrap();

        let analytics = round_analytics(&state, room_id).await.unwrap();
        assert!(!analytics.tie.tied);
        assert_eq!(analytics.majority.token, "5");
        assert_eq!(analytics.majority.count, 2);
        assert_eq!(analytics.participation_percent, 100.0);
        assert_eq!(analytics.suggested_score, "5");
    }

    #[tokio::test]
    async fn operations_fail_degraded_without_a_store() {
        let identity_path = std::env::temp_dir()
            .join(format!("room-service-test-{}", Uuid::new_v4()))
            .join("identity.json");
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(JsonFileIdentityStore::new(identity_path)),
        );

        let err = create_room(&state, create_request("Alice")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }
}
