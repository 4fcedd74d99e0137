//! Render update kinds and flush policy.
//!
//! Single source of truth for which updates are "immediate" (presented
//! without batching) vs batched.

use std::sync::Arc;

use crate::api::{HealthReport, SessionSummary, VersionInfo};
use crate::engine::{ConnectionState, Event};

use super::event_bus::BusEvent;

#[derive(Debug, Clone)]
pub enum SinkUpdate {
    // -- stream rows (batched) ------------------------------------------------
    Append(Arc<Event>),
    DropOldest(usize),
    EventCount(usize),

    // -- stream control -------------------------------------------------------
    Clear,
    Connection(ConnectionState),
    StreamError(String),

    // -- polled backend state -------------------------------------------------
    Health(HealthReport),
    Sessions(Arc<Vec<SessionSummary>>),
    System(Arc<serde_json::Value>),
    Version(VersionInfo),

    /// One-line message for the user: view switches, command feedback.
    Notice(String),
}

impl SinkUpdate {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Append(_) => "append",
            Self::DropOldest(_) => "drop_oldest",
            Self::EventCount(_) => "event_count",
            Self::Clear => "clear",
            Self::Connection(_) => "connection",
            Self::StreamError(_) => "stream_error",
            Self::Health(_) => "health",
            Self::Sessions(_) => "sessions",
            Self::System(_) => "system",
            Self::Version(_) => "version",
            Self::Notice(_) => "notice",
        }
    }
}

/// Returns true if this update should be presented immediately instead of
/// being buffered. Immediate updates flush the current buffer first so
/// ordering is preserved.
pub fn should_flush_immediately(event: &BusEvent) -> bool {
    !matches!(
        event.update,
        SinkUpdate::Append(_) | SinkUpdate::DropOldest(_) | SinkUpdate::EventCount(_)
    )
}
