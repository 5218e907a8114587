//! Wire-facing payloads and input validation.

use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Read-only room projections shared by REST and SSE responses.
pub mod common;
/// Health payloads.
pub mod health;
/// Room operation requests and responses.
pub mod room;
/// SSE payloads.
pub mod sse;
/// Input sanitization and validation rules.
pub mod validation;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
