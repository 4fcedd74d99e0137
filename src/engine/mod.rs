//! Live event stream engine.
//!
//! Data flows one way:
//!
//! ```text
//! connector -> StreamSession reader -> Inbound channel -> StreamManager
//!     -> EventBuffer (append + batched eviction)
//!     -> FilterState predicate -> RenderSink
//! ```
//!
//! Filter or search changes re-run the predicate over the whole buffer.

mod buffer;
mod event;
mod filter;
mod manager;
mod session;
mod sink;


pub use buffer::{BufferPolicy, EventBuffer, DEFAULT_RETAIN, DEFAULT_SOFT_CAP};
pub use event::{
    extract_timestamp, parse_timestamp, Block, Event, EventBody, LogKind, Provenance, Role,
    SessionMessage,
};
pub use filter::{category_match, search_match, CategoryFilter, FilterState};
pub use manager::{StreamManager, StreamSettings, DEFAULT_RECONNECT_DELAY};
pub use session::{Inbound, Signal, StreamSession};
pub use sink::{ConnectionState, MemorySink, RenderSink};
