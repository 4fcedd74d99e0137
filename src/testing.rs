//! Shared helpers for unit tests.
//!
//! `ScriptedConnector` stands in for the SSE connector: each connection
//! attempt to a target pops the next scripted outcome, either an immediate
//! failure or a feed the test drives message by message.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc;

use crate::api::{ApiError, BackendApi, HealthStatus, SessionSummary, VersionInfo};
use crate::engine::{
    BufferPolicy, Event, Inbound, MemorySink, RenderSink, StreamManager, StreamSettings,
};
use crate::transport::{StreamConnector, StreamTarget, TransportError, WireMessage, WireStream};

pub(crate) type FeedSender = mpsc::UnboundedSender<Result<WireMessage, TransportError>>;

enum Script {
    Fail(TransportError),
    Feed(mpsc::UnboundedReceiver<Result<WireMessage, TransportError>>),
}

#[derive(Default)]
pub(crate) struct ScriptedConnector {
    scripts: Mutex<HashMap<StreamTarget, VecDeque<Script>>>,
    attempts: Mutex<Vec<StreamTarget>>,
}

impl ScriptedConnector {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The next attempt on `target` fails with `err`.
    pub(crate) fn fail_next(&self, target: StreamTarget, err: TransportError) {
        self.push(target, Script::Fail(err));
    }

    /// The next attempt on `target` succeeds; the returned sender feeds it.
    /// Dropping the sender ends the stream.
    pub(crate) fn feed_next(&self, target: StreamTarget) -> FeedSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(target, Script::Feed(rx));
        tx
    }

    /// Number of connection attempts made on `target`.
    pub(crate) fn attempts(&self, target: &StreamTarget) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|attempt| *attempt == target)
            .count()
    }

    fn push(&self, target: StreamTarget, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .entry(target)
            .or_default()
            .push_back(script);
    }
}

#[async_trait]
impl StreamConnector for ScriptedConnector {
    async fn connect(&self, target: &StreamTarget) -> Result<WireStream, TransportError> {
        self.attempts.lock().unwrap().push(target.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(target)
            .and_then(VecDeque::pop_front);

        match script {
            Some(Script::Fail(err)) => Err(err),
            Some(Script::Feed(rx)) => Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async {
                rx.recv().await.map(|item| (item, rx))
            }))),
            None => Err(TransportError::Connection(format!("no scripted connection for {target}"))),
        }
    }
}

pub(crate) fn settings(soft_cap: usize, retain: usize) -> StreamSettings {
    StreamSettings {
        buffer: BufferPolicy { soft_cap, retain },
        ..StreamSettings::default()
    }
}

pub(crate) fn manager_with(
    connector: Arc<ScriptedConnector>,
    settings: StreamSettings,
) -> (StreamManager<MemorySink>, mpsc::UnboundedReceiver<Inbound>) {
    StreamManager::new(MemorySink::new(), connector, settings)
}

/// Wait for the next inbound signal and handle it.
pub(crate) async fn pump<S: RenderSink>(
    manager: &mut StreamManager<S>,
    rx: &mut mpsc::UnboundedReceiver<Inbound>,
) {
    let inbound = rx.recv().await.expect("inbound channel closed");
    manager.handle(inbound);
}

/// Let spawned tasks run, then handle everything they produced.
pub(crate) async fn settle<S: RenderSink>(
    manager: &mut StreamManager<S>,
    rx: &mut mpsc::UnboundedReceiver<Inbound>,
) {
    for _ in 0..16 {
        tokio::task::yield_now().await;
        while let Ok(inbound) = rx.try_recv() {
            manager.handle(inbound);
        }
    }
}

pub(crate) fn log_message(kind: &str, raw: &str) -> WireMessage {
    WireMessage::Log(json!({ "type": kind, "raw": raw }))
}

pub(crate) fn log_event(seq: u64, kind: &str, raw: &str) -> Event {
    Event::from_log(&json!({ "type": kind, "raw": raw }), seq, Utc::now())
        .expect("object payload")
}

/// Backend stub with fixed answers; counts system snapshot fetches.
#[derive(Default)]
pub(crate) struct StaticApi {
    pub(crate) online: AtomicBool,
    pub(crate) sessions: Mutex<Vec<SessionSummary>>,
    pub(crate) system_calls: AtomicUsize,
}

#[async_trait]
impl BackendApi for StaticApi {
    async fn health(&self) -> Result<HealthStatus, ApiError> {
        Ok(HealthStatus {
            openclaw_available: self.online.load(Ordering::SeqCst),
            ..HealthStatus::default()
        })
    }

    async fn sessions(&self) -> Result<Vec<SessionSummary>, ApiError> {
        Ok(self.sessions.lock().unwrap().clone())
    }

    async fn system(&self) -> Result<serde_json::Value, ApiError> {
        self.system_calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "presence": { "online": 1 } }))
    }

    async fn version(&self) -> Result<VersionInfo, ApiError> {
        Ok(VersionInfo {
            version: Some("test".into()),
            ..VersionInfo::default()
        })
    }
}
