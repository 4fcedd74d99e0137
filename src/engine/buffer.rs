use std::collections::VecDeque;
use std::sync::Arc;

use super::event::Event;

pub const DEFAULT_SOFT_CAP: usize = 600;
pub const DEFAULT_RETAIN: usize = 500;

/// Batched eviction policy: once the buffer grows past `soft_cap`, it is cut
/// back to the newest `retain` events in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPolicy {
    pub soft_cap: usize,
    pub retain: usize,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self {
            soft_cap: DEFAULT_SOFT_CAP,
            retain: DEFAULT_RETAIN,
        }
    }
}

/// Receipt-ordered events of the active stream.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: VecDeque<Arc<Event>>,
    policy: BufferPolicy,
}

impl EventBuffer {
    pub fn new(policy: BufferPolicy) -> Self {
        Self {
            events: VecDeque::with_capacity(policy.soft_cap + 1),
            policy,
        }
    }

    /// Append at the tail and apply eviction. Returns the evicted events,
    /// oldest first; empty unless the soft cap was crossed.
    pub fn append(&mut self, event: Arc<Event>) -> Vec<Arc<Event>> {
        self.events.push_back(event);
        self.evict_if_over_capacity()
    }

    pub fn evict_if_over_capacity(&mut self) -> Vec<Arc<Event>> {
        if self.events.len() <= self.policy.soft_cap {
            return Vec::new();
        }
        let excess = self.events.len() - self.policy.retain;
        self.events.drain(..excess).collect()
    }

    pub fn reset(&mut self) {
        self.events.clear();
    }

    /// Full ordered contents, for re-rendering.
    pub fn snapshot(&self) -> Vec<Arc<Event>> {
        self.events.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Event>> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn policy(&self) -> BufferPolicy {
        self.policy
    }
}
