//! Shared helpers for stream integration tests.

use std::time::Duration;

use clawmon_lib::engine::{ConnectionState, Inbound, MemorySink, StreamManager};
use tokio::sync::mpsc::UnboundedReceiver;

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Build an SSE response body from `(category, data)` pairs, with a
/// heartbeat comment in front the way the backend sends one.
pub fn sse_body(frames: &[(&str, String)]) -> String {
    let mut body = String::from(": heartbeat\n\n");
    for (event, data) in frames {
        body.push_str(&format!("event: {event}\ndata: {data}\n\n"));
    }
    body
}

/// Feed inbound signals into the manager until the connection has been
/// lost, which for a finite test body means the server closed it.
pub async fn drive_until_disconnected(
    manager: &mut StreamManager<MemorySink>,
    inbound: &mut UnboundedReceiver<Inbound>,
) {
    loop {
        let next = tokio::time::timeout(STEP_TIMEOUT, inbound.recv())
            .await
            .expect("stream made no progress");
        let Some(signal) = next else {
            panic!("inbound channel closed");
        };
        manager.handle(signal);
        if manager.connection_state() == ConnectionState::Disconnected {
            return;
        }
    }
}
