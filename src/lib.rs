//! Library crate for the planning poker backend, exposing modules for
//! binaries and integration tests.

/// Runtime configuration loading.
pub mod config;
/// Persistence layer.
pub mod dao;
/// Wire payloads and validation.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP route trees.
pub mod routes;
/// Application services.
pub mod services;
/// Shared state, sessions, and the room state machine.
pub mod state;
