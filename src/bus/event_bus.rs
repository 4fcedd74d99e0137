use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use super::event_types::SinkUpdate;
use crate::engine::{ConnectionState, Event, RenderSink};

// A filter change can replay a whole buffer (retain + cap) in one burst.
const BUS_CAPACITY: usize = 4096;

#[derive(Debug, Clone)]
pub struct BusEvent {
    pub seq: u64,
    pub update: SinkUpdate,
}

pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
    seq: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            tx,
            seq: AtomicU64::new(0),
        }
    }

    /// Sequence-number and publish an update. Returns the sequence number.
    pub fn publish(&self, update: SinkUpdate) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let kind = update.kind();
        if let Err(e) = self.tx.send(BusEvent { seq, update }) {
            tracing::trace!("bus publish of {kind} had no receivers: {e}");
        }
        seq
    }

    /// Get a new receiver for this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }
}

/// [`RenderSink`] that forwards every engine call onto the bus.
#[derive(Clone)]
pub struct BusSink {
    bus: Arc<EventBus>,
}

impl BusSink {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}

impl RenderSink for BusSink {
    fn clear(&mut self) {
        self.bus.publish(SinkUpdate::Clear);
    }

    fn append(&mut self, event: &Arc<Event>) {
        self.bus.publish(SinkUpdate::Append(Arc::clone(event)));
    }

    fn drop_oldest(&mut self, count: usize) {
        self.bus.publish(SinkUpdate::DropOldest(count));
    }

    fn event_count(&mut self, count: usize) {
        self.bus.publish(SinkUpdate::EventCount(count));
    }

    fn connection_state(&mut self, state: ConnectionState) {
        self.bus.publish(SinkUpdate::Connection(state));
    }

    fn stream_error(&mut self, message: &str) {
        self.bus.publish(SinkUpdate::StreamError(message.to_string()));
    }
}
