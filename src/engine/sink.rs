//! Presentation seam.
//!
//! The engine never formats anything. It drives a [`RenderSink`] with the
//! classified events that pass the current filter, in buffer order, plus the
//! connection indicator and the buffered event count.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use super::event::Event;

/// Connection indicator state. `Idle` means no stream session is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait RenderSink {
    /// Drop everything shown. Sent on stream switch, buffer reset and before a
    /// filter-driven re-render.
    fn clear(&mut self);

    /// Show one event after those already shown. Historical vs live is carried
    /// by [`Event::provenance`].
    fn append(&mut self, event: &Arc<Event>);

    /// The buffer evicted its oldest events; `count` of them were shown.
    fn drop_oldest(&mut self, count: usize);

    /// Number of events currently buffered for the active stream.
    fn event_count(&mut self, count: usize);

    fn connection_state(&mut self, state: ConnectionState);

    /// Terminal stream error: replace the content with this message.
    fn stream_error(&mut self, message: &str);
}

/// In-memory sink mirroring what a display would show.
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: VecDeque<Arc<Event>>,
    count: usize,
    state: ConnectionState,
    error: Option<String>,
    clears: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> impl Iterator<Item = &Arc<Event>> {
        self.rows.iter()
    }

    /// Raw text of the shown rows, top to bottom.
    pub fn raw_rows(&self) -> Vec<&str> {
        self.rows.iter().map(|event| event.raw.as_str()).collect()
    }

    pub fn visible_len(&self) -> usize {
        self.rows.len()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clears(&self) -> usize {
        self.clears
    }
}

impl RenderSink for MemorySink {
    fn clear(&mut self) {
        self.rows.clear();
        self.error = None;
        self.clears += 1;
    }

    fn append(&mut self, event: &Arc<Event>) {
        self.rows.push_back(Arc::clone(event));
    }

    fn drop_oldest(&mut self, count: usize) {
        let count = count.min(self.rows.len());
        self.rows.drain(..count);
    }

    fn event_count(&mut self, count: usize) {
        self.count = count;
    }

    fn connection_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    fn stream_error(&mut self, message: &str) {
        self.rows.clear();
        self.error = Some(message.to_string());
    }
}
