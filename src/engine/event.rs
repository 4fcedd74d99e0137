//! Classified stream events.
//!
//! Classification happens once, at ingestion, from the raw wire payload.
//! After that an [`Event`] is shared behind an `Arc` and never mutated.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transport::StatusPayload;

// ---------------------------------------------------------------------------
// Log kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Enqueue,
    Dequeue,
    RunStart,
    RunDone,
    ToolStart,
    ToolEnd,
    SessionState,
    Error,
    Warn,
    Other,
}

impl LogKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Enqueue => "enqueue",
            Self::Dequeue => "dequeue",
            Self::RunStart => "run_start",
            Self::RunDone => "run_done",
            Self::ToolStart => "tool_start",
            Self::ToolEnd => "tool_end",
            Self::SessionState => "session_state",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Other => "other",
        }
    }

    /// Keyword classification of a plain log line. First match wins.
    pub fn classify_text(line: &str) -> Self {
        const RULES: &[(&[&str], LogKind)] = &[
            (&["enqueue"], LogKind::Enqueue),
            (&["dequeue"], LogKind::Dequeue),
            (&["run start", "run_start"], LogKind::RunStart),
            (&["run done", "run_done"], LogKind::RunDone),
            (&["tool start", "tool_start"], LogKind::ToolStart),
            (&["tool end", "tool_end"], LogKind::ToolEnd),
            (&["session state"], LogKind::SessionState),
            (&["error"], LogKind::Error),
            (&["warn"], LogKind::Warn),
        ];

        let lowered = line.to_lowercase();
        RULES
            .iter()
            .find(|(needles, _)| needles.iter().any(|needle| lowered.contains(needle)))
            .map(|(_, kind)| *kind)
            .unwrap_or(LogKind::Other)
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "enqueue" => Ok(Self::Enqueue),
            "dequeue" => Ok(Self::Dequeue),
            "run_start" => Ok(Self::RunStart),
            "run_done" => Ok(Self::RunDone),
            "tool_start" => Ok(Self::ToolStart),
            "tool_end" => Ok(Self::ToolEnd),
            "session_state" => Ok(Self::SessionState),
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "other" => Ok(Self::Other),
            _ => Err(format!("unknown log kind: {value}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Session messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
    ToolResult,
    Meta,
    Unknown,
}

impl Role {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "user" => Self::User,
            "assistant" => Self::Assistant,
            "toolResult" => Self::ToolResult,
            "meta" => Self::Meta,
            _ => Self::Unknown,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::ToolResult => "toolResult",
            Self::Meta => "meta",
            Self::Unknown => "unknown",
        }
    }
}

/// One typed content block of a session message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Text {
        #[serde(default)]
        content: String,
    },
    Thinking {
        #[serde(default)]
        content: String,
    },
    ToolCall {
        #[serde(default)]
        name: String,
        #[serde(default)]
        arguments: Value,
        #[serde(rename = "toolCallId", default)]
        call_id: String,
    },
    ToolResult {
        #[serde(default)]
        content: Value,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionMessage {
    pub role: Role,
    pub blocks: Vec<Block>,
    /// Original record for `meta` messages.
    pub meta: Option<Value>,
}

impl SessionMessage {
    /// Decode a `session_event` body. Non-object payloads are rejected;
    /// blocks of unknown type are skipped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let role = Role::from_wire(object.get("role").and_then(Value::as_str).unwrap_or("unknown"));
        let blocks = object
            .get("blocks")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|block| serde_json::from_value(block.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            role,
            blocks,
            meta: object.get("meta").cloned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Whether a session event was replayed from history or arrived live.
/// Log tail events are always `Live`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    Historical,
    Live,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    Log(LogKind),
    Session(SessionMessage),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Receipt order within the current stream.
    pub seq: u64,
    pub body: EventBody,
    pub timestamp: DateTime<Utc>,
    /// True when no usable source timestamp existed and receipt time was used.
    pub timestamp_inferred: bool,
    pub received_at: DateTime<Utc>,
    /// Original text, used for search and copy.
    pub raw: String,
    pub provenance: Provenance,
}

impl Event {
    /// Classify a `log` frame body. Returns `None` for non-object payloads.
    pub fn from_log(payload: &Value, seq: u64, received_at: DateTime<Utc>) -> Option<Self> {
        let object = payload.as_object()?;
        let raw = object
            .get("raw")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .and_then(|value| value.parse::<LogKind>().ok())
            .unwrap_or_else(|| LogKind::classify_text(&raw));
        let (timestamp, timestamp_inferred) = resolve_timestamp(payload, received_at);

        Some(Self {
            seq,
            body: EventBody::Log(kind),
            timestamp,
            timestamp_inferred,
            received_at,
            raw,
            provenance: Provenance::Live,
        })
    }

    /// A server `status` notice rendered as a log row (`warn` unless the
    /// payload names another kind).
    pub fn from_status(status: &StatusPayload, seq: u64, received_at: DateTime<Utc>) -> Self {
        let kind = status
            .kind
            .as_deref()
            .and_then(|value| value.parse::<LogKind>().ok())
            .unwrap_or(LogKind::Warn);

        Self {
            seq,
            body: EventBody::Log(kind),
            timestamp: received_at,
            timestamp_inferred: true,
            received_at,
            raw: status.message.clone(),
            provenance: Provenance::Live,
        }
    }

    /// Classify a `session_event` frame body.
    pub fn from_session(
        payload: &Value,
        provenance: Provenance,
        seq: u64,
        received_at: DateTime<Utc>,
    ) -> Option<Self> {
        let message = SessionMessage::from_value(payload)?;
        let (timestamp, timestamp_inferred) = resolve_timestamp(payload, received_at);

        Some(Self {
            seq,
            body: EventBody::Session(message),
            timestamp,
            timestamp_inferred,
            received_at,
            raw: payload.to_string(),
            provenance,
        })
    }

    /// Log kind, or `None` for session messages.
    pub fn kind(&self) -> Option<LogKind> {
        match &self.body {
            EventBody::Log(kind) => Some(*kind),
            EventBody::Session(_) => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match &self.body {
            EventBody::Log(_) => None,
            EventBody::Session(message) => Some(message.role),
        }
    }

    pub fn is_historical(&self) -> bool {
        self.provenance == Provenance::Historical
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

const TIMESTAMP_FIELDS: &[&str] = &["timestamp", "ts", "time", "@timestamp"];

fn resolve_timestamp(payload: &Value, received_at: DateTime<Utc>) -> (DateTime<Utc>, bool) {
    match extract_timestamp(payload) {
        Some(ts) => (ts, false),
        None => (received_at, true),
    }
}

/// Best-effort source timestamp of a payload.
pub fn extract_timestamp(payload: &Value) -> Option<DateTime<Utc>> {
    let candidate = TIMESTAMP_FIELDS
        .iter()
        .filter_map(|field| payload.get(*field))
        .find(|value| !value.is_null())
        .or_else(|| payload.get("_meta").and_then(|meta| meta.get("date")))?;

    match candidate {
        Value::String(text) => parse_timestamp(text),
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|ms| ms as i64))
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

/// Parse the timestamp shapes found in openclaw logs: RFC 3339, naive
/// date-times (local time) and bare clock times (today, local time).
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(ts) = DateTime::parse_from_str(text, format) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return local_to_utc(naive);
        }
    }
    if let Ok(time) = NaiveTime::parse_from_str(text, "%H:%M:%S%.f") {
        return local_to_utc(Local::now().date_naive().and_time(time));
    }
    None
}

fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
}
