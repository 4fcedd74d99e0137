//! Render update bus.
//!
//! Updates flow from the engine and the pollers to the terminal:
//! `BusSink` / console -> `EventBus` -> `EventBatcher` -> `Presenter`.
//!
//! - `EventBus`: in-memory broadcast channel, sequence-numbered
//! - `EventBatcher`: buffers event rows (100ms/50 updates) before presenting;
//!   connection, error and overlay updates flush immediately

mod batcher;
mod event_bus;
mod event_types;


pub use batcher::{BatchPolicy, EventBatcher, Presenter};
pub use event_bus::{BusEvent, BusSink, EventBus};
pub use event_types::{should_flush_immediately, SinkUpdate};
