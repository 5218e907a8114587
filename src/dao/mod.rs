//! Persistence layer: document models, storage errors, and room stores.

/// Persisted document shapes shared by every backend.
pub mod models;
/// Room store trait and its backends.
pub mod room_store;
/// Backend-agnostic storage errors.
pub mod storage;
