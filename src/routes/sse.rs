use std::convert::Infallible;

use axum::{Router, extract::{Path, State}, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{
    error::AppError,
    services::{room_service, sse_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/rooms/{code}/stream",
    tag = "sse",
    params(("code" = String, Path, description = "Shareable room code")),
    responses(
        (status = 200, description = "Room update stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Room not found")
    )
)]
/// Stream a room's confirmed updates to a connected client.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let session = room_service::observe_room(&state, &code).await?;
    info!(room_id = %session.room_id(), "new room SSE connection");
    Ok(sse_service::room_stream(state, session))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{code}/stream", get(room_stream))
}
