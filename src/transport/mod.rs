//! Wire contract for the monitor backend's server-push streams.
//!
//! The backend exposes two SSE endpoints:
//! - `/api/logs/stream`: the global log tail (`log` and `status` categories)
//! - `/api/session/<id>/stream`: one conversation, replayed then followed
//!   (`session_event`, `history_done` and `status` categories)
//!
//! Every frame is decoded into a [`WireMessage`] so the engine dispatches on a
//! single tagged union instead of per-category callbacks.

mod sse;


use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::Deserialize;

pub use sse::{SseConnector, SseDecoder, SseFrame};

/// Name of the session cookie issued by `/api/login`.
pub const SESSION_COOKIE: &str = "monitor_sid";

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while opening or reading a stream connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("stream error: {0}")]
    Stream(String),
    #[error("stream closed by server")]
    Closed,
    #[error("invalid payload: {0}")]
    Payload(String),
}

impl TransportError {
    pub fn connection<E: fmt::Display>(err: E) -> Self {
        TransportError::Connection(err.to_string())
    }
}

// ============================================================================
// Stream targets
// ============================================================================

/// Which feed a connection is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamTarget {
    LiveTail,
    Session(String),
}

impl StreamTarget {
    /// Request path of this feed, relative to the backend base URL.
    pub fn path(&self) -> String {
        match self {
            StreamTarget::LiveTail => "/api/logs/stream".to_string(),
            StreamTarget::Session(id) => {
                format!("/api/session/{}/stream", urlencoding::encode(id))
            }
        }
    }

    pub fn is_live_tail(&self) -> bool {
        matches!(self, StreamTarget::LiveTail)
    }
}

impl fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamTarget::LiveTail => write!(f, "live"),
            StreamTarget::Session(id) => write!(f, "session:{id}"),
        }
    }
}

// ============================================================================
// Wire messages
// ============================================================================

/// Body of a `status` frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusPayload {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl StatusPayload {
    /// A `status` with `type = "error"` ends a session stream.
    pub fn is_error(&self) -> bool {
        self.kind.as_deref() == Some("error")
    }
}

/// One decoded server-push message.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    Log(serde_json::Value),
    Status(StatusPayload),
    SessionEvent(serde_json::Value),
    HistoryDone,
}

impl WireMessage {
    /// Decode one SSE frame.
    ///
    /// Returns `Ok(None)` for categories this client does not consume and an
    /// error when the frame body is not valid JSON for its category.
    pub fn from_frame(frame: &SseFrame) -> Result<Option<Self>, TransportError> {
        let message = match frame.event.as_str() {
            "log" => WireMessage::Log(parse_json(&frame.data)?),
            "session_event" => WireMessage::SessionEvent(parse_json(&frame.data)?),
            "status" => WireMessage::Status(
                serde_json::from_str(&frame.data)
                    .map_err(|e| TransportError::Payload(format!("status: {e}")))?,
            ),
            "history_done" => WireMessage::HistoryDone,
            _ => return Ok(None),
        };
        Ok(Some(message))
    }

    /// SSE category this message arrived under.
    pub fn category(&self) -> &'static str {
        match self {
            WireMessage::Log(_) => "log",
            WireMessage::Status(_) => "status",
            WireMessage::SessionEvent(_) => "session_event",
            WireMessage::HistoryDone => "history_done",
        }
    }
}

fn parse_json(data: &str) -> Result<serde_json::Value, TransportError> {
    serde_json::from_str(data).map_err(|e| TransportError::Payload(e.to_string()))
}

// ============================================================================
// Connector seam
// ============================================================================

/// Stream of decoded messages from one connection. An `Err` item means the
/// transport failed and the stream is over; a clean end of stream means the
/// server closed the connection.
pub type WireStream = Pin<Box<dyn Stream<Item = Result<WireMessage, TransportError>> + Send>>;

/// Opens server-push connections.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self, target: &StreamTarget) -> Result<WireStream, TransportError>;
}
