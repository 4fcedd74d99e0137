//! One live connection and its reconnection timer.
//!
//! A [`StreamSession`] never touches the buffer or the sink. Its reader task
//! forwards everything it receives as [`Inbound`] signals tagged with the
//! session id; the manager processes them one at a time and discards any
//! signal whose id is not the active session's.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::sink::ConnectionState;
use crate::transport::{StreamConnector, StreamTarget, TransportError, WireMessage};

/// A signal for the engine, tagged with the session that produced it.
#[derive(Debug)]
pub struct Inbound {
    pub session: u64,
    pub signal: Signal,
}

#[derive(Debug)]
pub enum Signal {
    /// The connection was established.
    Opened,
    Message(WireMessage),
    /// The connection failed or ended. The reader task has exited.
    Failed(TransportError),
    /// The reconnect delay elapsed.
    RetryDue,
}

pub struct StreamSession {
    id: u64,
    target: StreamTarget,
    state: ConnectionState,
    history_done: bool,
    terminated: bool,
    seq: u64,
    reader: Option<JoinHandle<()>>,
    retry: Option<JoinHandle<()>>,
}

impl StreamSession {
    pub fn new(id: u64, target: StreamTarget) -> Self {
        Self {
            id,
            target,
            state: ConnectionState::Idle,
            history_done: false,
            terminated: false,
            seq: 0,
            reader: None,
            retry: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target(&self) -> &StreamTarget {
        &self.target
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True once the end-of-history marker arrived.
    pub fn history_done(&self) -> bool {
        self.history_done
    }

    /// True after a server-signaled terminal error.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn has_connection(&self) -> bool {
        self.reader.is_some()
    }

    pub fn has_pending_retry(&self) -> bool {
        self.retry.is_some()
    }

    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            trace!(session = self.id, from = %self.state, to = %state, "stream state");
            self.state = state;
        }
    }

    pub(crate) fn mark_history_done(&mut self) {
        self.history_done = true;
    }

    pub(crate) fn next_seq(&mut self) -> u64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }

    /// Start a connection attempt. Any previous reader is aborted first.
    ///
    /// A session feed replays its history on every connection, so the
    /// history marker starts over.
    pub(crate) fn open(
        &mut self,
        connector: Arc<dyn StreamConnector>,
        tx: mpsc::UnboundedSender<Inbound>,
    ) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.history_done = false;
        self.set_state(ConnectionState::Connecting);
        debug!(session = self.id, target = %self.target, "opening stream");
        self.reader = Some(tokio::spawn(read_connection(
            self.id,
            self.target.clone(),
            connector,
            tx,
        )));
    }

    /// The reader task reported failure and exited.
    pub(crate) fn connection_lost(&mut self) {
        self.reader = None;
        self.set_state(ConnectionState::Disconnected);
    }

    /// Arm the single-shot reconnect timer. Returns false if one is already
    /// pending.
    pub(crate) fn schedule_retry(
        &mut self,
        delay: Duration,
        tx: mpsc::UnboundedSender<Inbound>,
    ) -> bool {
        if self.retry.is_some() {
            return false;
        }
        let id = self.id;
        self.retry = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Inbound {
                session: id,
                signal: Signal::RetryDue,
            });
        }));
        true
    }

    /// The retry timer fired; forget its handle.
    pub(crate) fn retry_fired(&mut self) {
        self.retry = None;
    }

    /// Server-signaled terminal error: close and never retry.
    pub(crate) fn terminate(&mut self) {
        self.cancel_tasks();
        self.terminated = true;
        self.set_state(ConnectionState::Disconnected);
    }

    /// Close the connection and cancel any pending reconnect. Idempotent.
    pub fn stop(&mut self) {
        self.cancel_tasks();
        self.set_state(ConnectionState::Idle);
    }

    fn cancel_tasks(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(retry) = self.retry.take() {
            debug!(session = self.id, "cancelled pending reconnect");
            retry.abort();
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.cancel_tasks();
    }
}

async fn read_connection(
    id: u64,
    target: StreamTarget,
    connector: Arc<dyn StreamConnector>,
    tx: mpsc::UnboundedSender<Inbound>,
) {
    let send = |signal| tx.send(Inbound { session: id, signal }).is_ok();

    let mut stream = match connector.connect(&target).await {
        Ok(stream) => stream,
        Err(err) => {
            send(Signal::Failed(err));
            return;
        }
    };
    if !send(Signal::Opened) {
        return;
    }

    while let Some(item) = stream.next().await {
        match item {
            Ok(message) => {
                if !send(Signal::Message(message)) {
                    return;
                }
            }
            Err(err) => {
                send(Signal::Failed(err));
                return;
            }
        }
    }
    send(Signal::Failed(TransportError::Closed));
}
