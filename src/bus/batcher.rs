use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::event_types::should_flush_immediately;
use super::BusEvent;

const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_MAX_BATCH: usize = 50;

/// Receives flushed batches, in bus order.
pub trait Presenter: Send + 'static {
    fn present(&mut self, batch: &[BusEvent]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub flush_interval: Duration,
    pub max_batch: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_batch: DEFAULT_MAX_BATCH,
        }
    }
}

pub struct EventBatcher;

impl EventBatcher {
    /// Spawn a background task that batches bus updates into `presenter`.
    ///
    /// - Immediate updates (see [`should_flush_immediately`]) flush the
    ///   buffer and are then presented as a single-element batch.
    /// - Row updates are buffered and flushed every `flush_interval` or when
    ///   the buffer reaches `max_batch`.
    ///
    /// The task ends when the bus is dropped, after flushing the remainder.
    pub fn start<P: Presenter>(
        mut rx: broadcast::Receiver<BusEvent>,
        mut presenter: P,
        policy: BatchPolicy,
    ) -> JoinHandle<()> {
        let max_batch = policy.max_batch.max(1);
        tokio::spawn(async move {
            let mut buffer: Vec<BusEvent> = Vec::with_capacity(max_batch);
            let mut interval =
                time::interval_at(Instant::now() + policy.flush_interval, policy.flush_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    result = rx.recv() => {
                        match result {
                            Ok(event) => {
                                if should_flush_immediately(&event) {
                                    // Flush buffer first so ordering is preserved
                                    flush(&mut presenter, &mut buffer);
                                    presenter.present(std::slice::from_ref(&event));
                                } else {
                                    buffer.push(event);
                                    if buffer.len() >= max_batch {
                                        flush(&mut presenter, &mut buffer);
                                    }
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                tracing::warn!("render batcher lagged, dropped {n} updates");
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                flush(&mut presenter, &mut buffer);
                                break;
                            }
                        }
                    }
                    _ = interval.tick() => flush(&mut presenter, &mut buffer),
                }
            }
        })
    }
}

fn flush<P: Presenter>(presenter: &mut P, buffer: &mut Vec<BusEvent>) {
    if buffer.is_empty() {
        return;
    }
    presenter.present(buffer);
    buffer.clear();
}
