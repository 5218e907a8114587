use axum::{Json, Router, extract::State, http::StatusCode, routing::get};

use crate::{error::AppError, services::identity_service::StoredIdentity, state::SharedState};

/// Routes exposing the cached local participant identity.
pub fn router() -> Router<SharedState> {
    Router::new().route("/identity", get(get_identity).delete(clear_identity))
}

/// Return the cached participant identity, if any.
#[utoipa::path(
    get,
    path = "/identity",
    tag = "identity",
    responses(
        (status = 200, description = "Cached identity", body = StoredIdentity),
        (status = 404, description = "No identity cached")
    )
)]
pub async fn get_identity(
    State(state): State<SharedState>,
) -> Result<Json<StoredIdentity>, AppError> {
    state
        .identities()
        .load()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no identity cached".into()))
}

/// Forget the cached participant identity.
#[utoipa::path(
    delete,
    path = "/identity",
    tag = "identity",
    responses((status = 204, description = "Identity cleared"))
)]
pub async fn clear_identity(State(state): State<SharedState>) -> StatusCode {
    state.identities().clear();
    StatusCode::NO_CONTENT
}
