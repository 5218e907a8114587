use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the planning poker backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::room::create_room,
        crate::routes::room::join_room,
        crate::routes::room::get_room,
        crate::routes::room::cast_vote,
        crate::routes::room::reveal_votes,
        crate::routes::room::hide_votes,
        crate::routes::room::new_round,
        crate::routes::room::close_room,
        crate::routes::room::remove_participant,
        crate::routes::room::check_ownership,
        crate::routes::room::get_analytics,
        crate::routes::sse::room_stream,
        crate::routes::identity::get_identity,
        crate::routes::identity::clear_identity,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::common::RoomSnapshot,
            crate::dto::common::ParticipantSnapshot,
            crate::dto::common::RoundRecordSnapshot,
            crate::dto::common::CapturedVoteSnapshot,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::JoinRoomRequest,
            crate::dto::room::CastVoteRequest,
            crate::dto::room::NewRoundRequest,
            crate::dto::room::CloseRoomRequest,
            crate::dto::room::RoomMembershipResponse,
            crate::dto::room::OwnershipResponse,
            crate::dto::room::RoundAnalyticsResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::RoomGoneEvent,
            crate::dao::models::RoomStatusEntity,
            crate::dao::models::ParticipantRoleEntity,
            crate::services::identity_service::StoredIdentity,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "room", description = "Room lifecycle and voting operations"),
        (name = "sse", description = "Server-sent room update streams"),
        (name = "identity", description = "Cached local participant identity"),
    )
)]
pub struct ApiDoc;
