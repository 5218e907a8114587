use axum::Router;

use crate::state::SharedState;

/// Swagger UI and OpenAPI document.
pub mod docs;
/// Health check endpoint.
pub mod health;
/// Cached participant identity endpoints.
pub mod identity;
/// Room lifecycle and voting endpoints.
pub mod room;
/// Room update streams.
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(room::router())
        .merge(identity::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
