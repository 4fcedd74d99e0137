//! Polled backend state: gateway health and the session directory.
//!
//! Each poller carries its own [`SingleFlight`] guard, so a tick that fires
//! while the previous request is still outstanding is skipped instead of
//! stacking a second request.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::error::ApiError;
use super::types::{HealthStatus, SessionSummary};
use super::BackendApi;

/// Non-reentrancy flag for one kind of poll.
#[derive(Debug, Default)]
pub struct SingleFlight {
    busy: AtomicBool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flight, or `None` if one is already in progress. The flight
    /// is released when the guard drops.
    pub fn try_acquire(&self) -> Option<FlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { busy: &self.busy })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

pub struct FlightGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    WentOffline,
    CameOnline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub online: bool,
    /// `None` when the fetch failed.
    pub status: Option<HealthStatus>,
    /// Set only when a previous observation exists and differs.
    pub transition: Option<HealthTransition>,
    pub error: Option<String>,
}

const UNKNOWN: u8 = 0;
const OFFLINE: u8 = 1;
const ONLINE: u8 = 2;

pub struct HealthMonitor {
    api: Arc<dyn BackendApi>,
    flight: SingleFlight,
    last: AtomicU8,
}

impl HealthMonitor {
    pub fn new(api: Arc<dyn BackendApi>) -> Self {
        Self {
            api,
            flight: SingleFlight::new(),
            last: AtomicU8::new(UNKNOWN),
        }
    }

    /// Last observed availability, `None` before the first poll.
    pub fn last_known(&self) -> Option<bool> {
        decode(self.last.load(Ordering::Acquire))
    }

    /// Fetch `/api/health` once. Returns `None` if a poll is already running.
    pub async fn poll(&self) -> Option<HealthReport> {
        let Some(_flight) = self.flight.try_acquire() else {
            debug!("health poll already in flight, skipping");
            return None;
        };

        let (online, status, error) = match self.api.health().await {
            Ok(status) => (status.openclaw_available, Some(status), None),
            Err(err) => {
                warn!("health check failed: {err}");
                (false, None, Some(err.to_string()))
            }
        };

        let previous = decode(
            self.last
                .swap(if online { ONLINE } else { OFFLINE }, Ordering::AcqRel),
        );
        let transition = match previous {
            Some(previous) if previous != online => Some(if online {
                HealthTransition::CameOnline
            } else {
                HealthTransition::WentOffline
            }),
            _ => None,
        };
        if let Some(transition) = transition {
            info!(?transition, "gateway availability changed");
        }

        Some(HealthReport {
            online,
            status,
            transition,
            error,
        })
    }
}

fn decode(value: u8) -> Option<bool> {
    match value {
        ONLINE => Some(true),
        OFFLINE => Some(false),
        _ => None,
    }
}

// ============================================================================
// Sessions
// ============================================================================

pub struct SessionDirectory {
    api: Arc<dyn BackendApi>,
    flight: SingleFlight,
    sessions: RwLock<Vec<SessionSummary>>,
}

impl SessionDirectory {
    pub fn new(api: Arc<dyn BackendApi>) -> Self {
        Self {
            api,
            flight: SingleFlight::new(),
            sessions: RwLock::new(Vec::new()),
        }
    }

    /// Fetch and sort `/api/sessions`. Returns `None` if a poll is already
    /// running. A failed fetch leaves the previous listing in place.
    pub async fn poll(&self) -> Option<Result<Vec<SessionSummary>, ApiError>> {
        let Some(_flight) = self.flight.try_acquire() else {
            debug!("sessions poll already in flight, skipping");
            return None;
        };

        let result = match self.api.sessions().await {
            Ok(mut sessions) => {
                sort_sessions(&mut sessions);
                debug!(
                    total = sessions.len(),
                    active = active_count(&sessions),
                    "sessions refreshed"
                );
                *self.sessions.write().await = sessions.clone();
                Ok(sessions)
            }
            Err(err) => {
                warn!("sessions load failed: {err}");
                Err(err)
            }
        };
        Some(result)
    }

    pub async fn snapshot(&self) -> Vec<SessionSummary> {
        self.sessions.read().await.clone()
    }

    pub async fn find(&self, id: &str) -> Option<SessionSummary> {
        self.sessions
            .read()
            .await
            .iter()
            .find(|session| session.id == id)
            .cloned()
    }
}

/// Processing sessions first, then most recently modified.
pub fn sort_sessions(sessions: &mut [SessionSummary]) {
    sessions.sort_by(|a, b| {
        b.is_processing().cmp(&a.is_processing()).then_with(|| {
            b.mtime
                .unwrap_or_default()
                .total_cmp(&a.mtime.unwrap_or_default())
        })
    });
}

pub fn active_count(sessions: &[SessionSummary]) -> usize {
    sessions.iter().filter(|session| session.is_processing()).count()
}
