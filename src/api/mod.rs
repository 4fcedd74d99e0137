//! Client for the monitor backend's request/response endpoints.

mod client;
mod error;
mod monitor;
mod types;


use async_trait::async_trait;

pub use client::BackendClient;
pub use error::ApiError;
pub use monitor::{
    active_count, sort_sessions, FlightGuard, HealthMonitor, HealthReport, HealthTransition,
    SessionDirectory, SingleFlight,
};
pub use types::{abbreviate_id, short_id, HealthStatus, SessionSummary, TokenUsage, VersionInfo};

#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn health(&self) -> Result<HealthStatus, ApiError>;
    async fn sessions(&self) -> Result<Vec<SessionSummary>, ApiError>;
    /// Opaque system snapshot.
    async fn system(&self) -> Result<serde_json::Value, ApiError>;
    async fn version(&self) -> Result<VersionInfo, ApiError>;
}
