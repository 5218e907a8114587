use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        common::RoomSnapshot,
        room::{
            CastVoteRequest, CloseRoomRequest, CreateRoomRequest, JoinRoomRequest, NewRoundRequest,
            OwnershipQuery, OwnershipResponse, RoomMembershipResponse, RoundAnalyticsResponse,
        },
    },
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Routes handling room lifecycle and voting operations.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{code}/join", post(join_room))
        .route("/rooms/{id}", get(get_room))
        .route("/rooms/{id}/votes", post(cast_vote))
        .route("/rooms/{id}/reveal", post(reveal_votes))
        .route("/rooms/{id}/hide", post(hide_votes))
        .route("/rooms/{id}/rounds", post(new_round))
        .route("/rooms/{id}/close", post(close_room))
        .route(
            "/rooms/{id}/participants/{participant_id}",
            delete(remove_participant),
        )
        .route("/rooms/{id}/owner", get(check_ownership))
        .route("/rooms/{id}/analytics", get(get_analytics))
}

/// Open a new room and seat its creator.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "room",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = RoomMembershipResponse),
        (status = 400, description = "Invalid name or prompt")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateRoomRequest>>,
) -> Result<Json<RoomMembershipResponse>, AppError> {
    Ok(Json(room_service::create_room(&state, payload).await?))
}

/// Join an existing room by its shareable code.
#[utoipa::path(
    post,
    path = "/rooms/{code}/join",
    tag = "room",
    params(("code" = String, Path, description = "Shareable room code")),
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Joined the room", body = RoomMembershipResponse),
        (status = 404, description = "Room not found"),
        (status = 410, description = "Room is closed")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<JoinRoomRequest>>,
) -> Result<Json<RoomMembershipResponse>, AppError> {
    Ok(Json(room_service::join_room(&state, &code, payload).await?))
}

/// Fetch the current state of a room.
#[utoipa::path(
    get,
    path = "/rooms/{id}",
    tag = "room",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Current room state", body = RoomSnapshot),
        (status = 404, description = "Room not found")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoomSnapshot>, AppError> {
    Ok(Json(room_service::room_snapshot(&state, id).await?))
}

/// Cast, change, or clear a vote for the open round.
#[utoipa::path(
    post,
    path = "/rooms/{id}/votes",
    tag = "room",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = CastVoteRequest,
    responses(
        (status = 200, description = "Vote recorded", body = RoomSnapshot),
        (status = 404, description = "Room or participant not found"),
        (status = 409, description = "Votes are revealed")
    )
)]
pub async fn cast_vote(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<CastVoteRequest>>,
) -> Result<Json<RoomSnapshot>, AppError> {
    Ok(Json(room_service::cast_vote(&state, id, payload).await?))
}

/// Turn all votes face-up.
#[utoipa::path(
    post,
    path = "/rooms/{id}/reveal",
    tag = "room",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Votes revealed", body = RoomSnapshot),
        (status = 404, description = "Room not found")
    )
)]
pub async fn reveal_votes(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoomSnapshot>, AppError> {
    Ok(Json(room_service::reveal_votes(&state, id).await?))
}

/// Turn votes back face-down, discarding the open round's votes.
#[utoipa::path(
    post,
    path = "/rooms/{id}/hide",
    tag = "room",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Votes hidden", body = RoomSnapshot),
        (status = 404, description = "Room not found")
    )
)]
pub async fn hide_votes(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoomSnapshot>, AppError> {
    Ok(Json(room_service::hide_votes(&state, id).await?))
}

/// Archive the open round when revealed and start the next one.
#[utoipa::path(
    post,
    path = "/rooms/{id}/rounds",
    tag = "room",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = NewRoundRequest,
    responses(
        (status = 200, description = "New round started", body = RoomSnapshot),
        (status = 404, description = "Room not found"),
        (status = 409, description = "Tied votes need an explicit final score")
    )
)]
pub async fn new_round(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<NewRoundRequest>>,
) -> Result<Json<RoomSnapshot>, AppError> {
    Ok(Json(
        room_service::start_new_round(&state, id, payload).await?,
    ))
}

/// Close a room for good.
#[utoipa::path(
    post,
    path = "/rooms/{id}/close",
    tag = "room",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = CloseRoomRequest,
    responses(
        (status = 200, description = "Room closed", body = RoomSnapshot),
        (status = 404, description = "Room not found")
    )
)]
pub async fn close_room(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<CloseRoomRequest>>,
) -> Result<Json<RoomSnapshot>, AppError> {
    Ok(Json(room_service::close_room(&state, id, payload).await?))
}

/// Remove a participant from the room.
#[utoipa::path(
    delete,
    path = "/rooms/{id}/participants/{participant_id}",
    tag = "room",
    params(
        ("id" = Uuid, Path, description = "Room identifier"),
        ("participant_id" = Uuid, Path, description = "Participant to remove")
    ),
    responses(
        (status = 200, description = "Participant removed", body = RoomSnapshot),
        (status = 403, description = "The owner cannot be removed"),
        (status = 404, description = "Room or participant not found")
    )
)]
pub async fn remove_participant(
    State(state): State<SharedState>,
    Path((id, participant_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RoomSnapshot>, AppError> {
    Ok(Json(
        room_service::remove_participant(&state, id, participant_id).await?,
    ))
}

/// Report whether a participant holds moderation authority over the room.
#[utoipa::path(
    get,
    path = "/rooms/{id}/owner",
    tag = "room",
    params(
        ("id" = Uuid, Path, description = "Room identifier"),
        ("participant_id" = Uuid, Query, description = "Participant to test")
    ),
    responses((status = 200, description = "Ownership verdict", body = OwnershipResponse))
)]
pub async fn check_ownership(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<OwnershipQuery>,
) -> Json<OwnershipResponse> {
    let owner = room_service::is_owner(&state, id, query.participant_id).await;
    Json(OwnershipResponse { owner })
}

/// Voting statistics for the room's open round.
#[utoipa::path(
    get,
    path = "/rooms/{id}/analytics",
    tag = "room",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Current round statistics", body = RoundAnalyticsResponse),
        (status = 404, description = "Room not found")
    )
)]
pub async fn get_analytics(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoundAnalyticsResponse>, AppError> {
    let analytics = room_service::round_analytics(&state, id).await?;
    Ok(Json(analytics.into()))
}
