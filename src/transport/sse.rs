//! Server-Sent Events framing and the reqwest-backed connector.

use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL, COOKIE};
use tracing::{debug, info, trace};

use super::{StreamConnector, StreamTarget, TransportError, WireMessage, WireStream, SESSION_COOKIE};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Frames
// ============================================================================

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event category (`event:` field), `"message"` when absent.
    pub event: String,
    /// Data lines joined with `\n`.
    pub data: String,
    pub id: Option<String>,
    /// Reconnection hint from the server, in milliseconds.
    pub retry: Option<u64>,
}

impl SseFrame {
    /// Parse one frame block (the text between two blank lines).
    ///
    /// Comment-only blocks such as the backend's `: heartbeat` and blocks
    /// without data yield `None`.
    pub fn parse(block: &str) -> Option<Self> {
        let mut event = None;
        let mut data: Option<String> = None;
        let mut id = None;
        let mut retry = None;

        for line in block.lines() {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };

            match field {
                "event" => event = Some(value.to_string()),
                "data" => match data.as_mut() {
                    Some(buf) => {
                        buf.push('\n');
                        buf.push_str(value);
                    }
                    None => data = Some(value.to_string()),
                },
                "id" => id = Some(value.to_string()),
                "retry" => retry = value.parse::<u64>().ok(),
                _ => trace!("unknown SSE field: {}", field),
            }
        }

        let data = data?;
        Some(Self {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
            id,
            retry,
        })
    }
}

/// Incremental SSE decoder.
///
/// Network chunks do not line up with frame boundaries, so bytes are held
/// until a blank line terminates the frame. Carriage returns are dropped on
/// entry which folds `\r\n` line endings into `\n`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        // Held bytes were already searched; only the last one can start a
        // separator with the new chunk.
        let mut from = self.pending.len().saturating_sub(1);
        self.pending
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = find_frame_end(&self.pending, from) {
            from = 0;
            let block: Vec<u8> = self.pending.drain(..end + 2).collect();
            let text = String::from_utf8_lossy(&block[..end]);
            if let Some(frame) = SseFrame::parse(&text) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Bytes received but not yet terminated by a blank line.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn find_frame_end(bytes: &[u8], from: usize) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(2)
        .position(|pair| pair == b"\n\n")
        .map(|offset| from + offset)
}

// ============================================================================
// Connector
// ============================================================================

/// Opens SSE connections to the monitor backend over HTTP.
#[derive(Debug, Clone)]
pub struct SseConnector {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
}

impl SseConnector {
    /// Create a connector for `base_url`, optionally authenticated with the
    /// session token obtained from `/api/login`.
    pub fn new(base_url: &str, session_token: Option<&str>) -> Result<Self, TransportError> {
        // No overall request timeout: the response body is the live stream.
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| TransportError::connection(format!("failed to create HTTP client: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        if let Some(token) = session_token {
            let cookie = HeaderValue::from_str(&format!("{SESSION_COOKIE}={token}"))
                .map_err(|e| TransportError::connection(format!("invalid session token: {e}")))?;
            headers.insert(COOKIE, cookie);
        }

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
        })
    }

    pub fn url_for(&self, target: &StreamTarget) -> String {
        format!("{}{}", self.base_url, target.path())
    }
}

#[async_trait]
impl StreamConnector for SseConnector {
    async fn connect(&self, target: &StreamTarget) -> Result<WireStream, TransportError> {
        let url = self.url_for(target);
        let response = self
            .client
            .get(&url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| TransportError::connection(format!("failed to connect to {url}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                status: status.as_u16(),
                message,
            });
        }

        info!("connected to SSE stream at {}", url);

        let mut decoder = SseDecoder::new();
        let messages = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder
                    .push(&bytes)
                    .iter()
                    .filter_map(decode_frame)
                    .map(Ok)
                    .collect::<Vec<_>>(),
                Err(e) => vec![Err(TransportError::Stream(e.to_string()))],
            })
            .flat_map(stream::iter);

        Ok(Box::pin(messages))
    }
}

/// Malformed frames are dropped here; the stream keeps going.
fn decode_frame(frame: &SseFrame) -> Option<WireMessage> {
    match WireMessage::from_frame(frame) {
        Ok(Some(message)) => Some(message),
        Ok(None) => {
            trace!("ignoring SSE category {}", frame.event);
            None
        }
        Err(e) => {
            debug!("dropping malformed {} frame: {}", frame.event, e);
            None
        }
    }
}
