//! The stream manager: single owner of the active session, the event buffer,
//! the filter selection and the render sink.
//!
//! All mutation happens through `&mut self` from one driver loop, so handlers
//! run one at a time and in delivery order. Switching streams stops the old
//! session (connection and reconnect timer) before the new one opens.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::buffer::{BufferPolicy, EventBuffer};
use super::event::{Event, Provenance};
use super::filter::{CategoryFilter, FilterState};
use super::session::{Inbound, Signal, StreamSession};
use super::sink::{ConnectionState, RenderSink};
use crate::transport::{StatusPayload, StreamConnector, StreamTarget, TransportError, WireMessage};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    pub reconnect_delay: Duration,
    pub buffer: BufferPolicy,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            buffer: BufferPolicy::default(),
        }
    }
}

pub struct StreamManager<S> {
    sink: S,
    connector: Arc<dyn StreamConnector>,
    settings: StreamSettings,
    buffer: EventBuffer,
    filter: FilterState,
    active: Option<StreamSession>,
    next_id: u64,
    tx: mpsc::UnboundedSender<Inbound>,
}

impl<S: RenderSink> StreamManager<S> {
    /// Create a manager and the receiving end of its inbound channel. The
    /// caller's loop feeds every received [`Inbound`] back into
    /// [`StreamManager::handle`].
    pub fn new(
        sink: S,
        connector: Arc<dyn StreamConnector>,
        settings: StreamSettings,
    ) -> (Self, mpsc::UnboundedReceiver<Inbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = Self {
            sink,
            connector,
            settings,
            buffer: EventBuffer::new(settings.buffer),
            filter: FilterState::default(),
            active: None,
            next_id: 1,
            tx,
        };
        (manager, rx)
    }

    // -----------------------------------------------------------------------
    // Stream lifecycle
    // -----------------------------------------------------------------------

    /// Open the global log tail. Returns the new session id.
    pub fn start_live_tail(&mut self) -> u64 {
        self.start(StreamTarget::LiveTail)
    }

    /// Open one conversation's replay-then-live feed. Returns the new session id.
    pub fn start_session_replay(&mut self, session_id: impl Into<String>) -> u64 {
        self.start(StreamTarget::Session(session_id.into()))
    }

    fn start(&mut self, target: StreamTarget) -> u64 {
        self.stop();
        self.buffer.reset();
        self.sink.clear();
        self.sink.event_count(0);

        let id = self.next_id;
        self.next_id += 1;
        info!(session = id, %target, "starting stream");

        let mut session = StreamSession::new(id, target);
        session.open(Arc::clone(&self.connector), self.tx.clone());
        self.sink.connection_state(session.state());
        self.active = Some(session);
        id
    }

    /// Close the active connection and cancel its reconnect timer. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut session) = self.active.take() {
            info!(session = session.id(), target = %session.target(), "stopping stream");
            session.stop();
            self.sink.connection_state(ConnectionState::Idle);
        }
    }

    /// Process one signal from the inbound channel.
    pub fn handle(&mut self, inbound: Inbound) {
        let Some(session) = self.active.as_ref() else {
            trace!(session = inbound.session, "no active stream, dropping signal");
            return;
        };
        if session.id() != inbound.session {
            trace!(session = inbound.session, "signal for inactive stream, dropping");
            return;
        }
        if session.is_terminated() {
            return;
        }

        match inbound.signal {
            Signal::Opened => self.on_opened(),
            Signal::Message(message) => self.on_message(message),
            Signal::Failed(err) => self.on_failed(err),
            Signal::RetryDue => self.on_retry_due(),
        }
    }

    fn on_opened(&mut self) {
        let Some(session) = self.active.as_mut() else {
            return;
        };
        // A session feed counts as connected only once history has replayed.
        let state = if session.target().is_live_tail() || session.history_done() {
            ConnectionState::Connected
        } else {
            ConnectionState::Connecting
        };
        session.set_state(state);
        self.sink.connection_state(state);
    }

    fn on_message(&mut self, message: WireMessage) {
        let Some(session) = self.active.as_mut() else {
            return;
        };
        let received_at = Utc::now();
        let is_live_tail = session.target().is_live_tail();

        let event = match message {
            WireMessage::Log(payload) if is_live_tail => {
                Event::from_log(&payload, session.next_seq(), received_at)
            }
            WireMessage::SessionEvent(payload) if !is_live_tail => {
                let provenance = if session.history_done() {
                    Provenance::Live
                } else {
                    Provenance::Historical
                };
                Event::from_session(&payload, provenance, session.next_seq(), received_at)
            }
            WireMessage::HistoryDone if !is_live_tail => {
                session.mark_history_done();
                session.set_state(ConnectionState::Connected);
                self.sink.connection_state(ConnectionState::Connected);
                return;
            }
            WireMessage::Status(status) if !is_live_tail && status.is_error() => {
                self.on_terminal_error(status);
                return;
            }
            WireMessage::Status(status) => {
                Some(Event::from_status(&status, session.next_seq(), received_at))
            }
            other => {
                debug!(
                    target = %session.target(),
                    "dropping {} message not valid for this stream",
                    other.category()
                );
                return;
            }
        };

        match event {
            Some(event) => self.ingest(event),
            None => debug!("dropping malformed event payload"),
        }
    }

    fn on_terminal_error(&mut self, status: StatusPayload) {
        let Some(session) = self.active.as_mut() else {
            return;
        };
        warn!(session = session.id(), "stream ended by server: {}", status.message);
        session.terminate();
        self.sink.connection_state(ConnectionState::Disconnected);
        self.sink.stream_error(&status.message);
    }

    fn on_failed(&mut self, err: TransportError) {
        let delay = self.settings.reconnect_delay;
        let tx = self.tx.clone();
        let Some(session) = self.active.as_mut() else {
            return;
        };

        session.connection_lost();
        self.sink.connection_state(ConnectionState::Disconnected);

        if session.schedule_retry(delay, tx) {
            warn!(
                session = session.id(),
                target = %session.target(),
                "stream lost ({err}), retrying in {:?}",
                delay
            );
        }
    }

    fn on_retry_due(&mut self) {
        let Some(session) = self.active.as_mut() else {
            return;
        };
        session.retry_fired();
        if session.state() != ConnectionState::Disconnected {
            return;
        }
        info!(session = session.id(), "reconnecting {}", session.target());
        session.open(Arc::clone(&self.connector), self.tx.clone());
        self.sink.connection_state(session.state());
    }

    // -----------------------------------------------------------------------
    // Buffer and filter
    // -----------------------------------------------------------------------

    fn ingest(&mut self, event: Event) {
        let event = Arc::new(event);
        let evicted = self.buffer.append(Arc::clone(&event));

        if self.filter.visible(&event) {
            self.sink.append(&event);
        }
        if !evicted.is_empty() {
            let shown = evicted.iter().filter(|e| self.filter.visible(e)).count();
            debug!(evicted = evicted.len(), shown, "buffer over capacity, evicted oldest");
            if shown > 0 {
                self.sink.drop_oldest(shown);
            }
        }
        self.sink.event_count(self.buffer.len());
    }

    /// Change the category filter and re-render the whole buffer.
    pub fn set_filter(&mut self, category: CategoryFilter) {
        if self.filter.set_category(category) {
            debug!(filter = %category, "filter changed");
            self.rerender();
        }
    }

    /// Change the search query and re-render the whole buffer.
    pub fn set_query(&mut self, query: impl Into<String>) {
        if self.filter.set_query(query) {
            debug!(query = self.filter.query(), "search changed");
            self.rerender();
        }
    }

    /// Clear, then replay the buffer through the current predicate in order.
    pub fn rerender(&mut self) {
        self.sink.clear();
        for event in self.buffer.iter() {
            if self.filter.visible(event) {
                self.sink.append(event);
            }
        }
        self.sink.event_count(self.buffer.len());
    }

    /// Empty the buffer and the sink. The connection stays up.
    pub fn clear(&mut self) {
        self.buffer.reset();
        self.sink.clear();
        self.sink.event_count(0);
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn connection_state(&self) -> ConnectionState {
        self.active
            .as_ref()
            .map_or(ConnectionState::Idle, StreamSession::state)
    }

    pub fn active_session(&self) -> Option<&StreamSession> {
        self.active.as_ref()
    }

    pub fn active_target(&self) -> Option<&StreamTarget> {
        self.active.as_ref().map(StreamSession::target)
    }

    pub fn has_pending_retry(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(StreamSession::has_pending_retry)
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
