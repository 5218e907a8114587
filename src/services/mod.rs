/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Persistent local participant identity cache.
pub mod identity_service;
/// Room lifecycle, voting, and moderation logic.
pub mod room_service;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervision and degraded-mode handling.
pub mod storage_supervisor;
/// Pure voting statistics.
pub mod vote_analytics;
