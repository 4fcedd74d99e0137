//! Small text formatters shared by the terminal views.

use chrono::{DateTime, Local, Utc};

use crate::engine::LogKind;

pub fn badge_label(kind: LogKind) -> &'static str {
    match kind {
        LogKind::Enqueue => "ENQ",
        LogKind::Dequeue => "DEQ",
        LogKind::RunStart => "RUN ▶",
        LogKind::RunDone => "RUN ✓",
        LogKind::ToolStart => "TOOL →",
        LogKind::ToolEnd => "← TOOL",
        LogKind::SessionState => "SESSION",
        LogKind::Error => "ERROR",
        LogKind::Warn => "WARN",
        LogKind::Other => "OTHER",
    }
}

/// Wall-clock `HH:MM:SS` in local time.
pub fn fmt_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M:%S").to_string()
}

pub fn fmt_tokens(n: u64) -> String {
    match n {
        0..=999 => n.to_string(),
        1_000..=999_999 => format!("{:.1}K", n as f64 / 1_000.0),
        _ => format!("{:.2}M", n as f64 / 1_000_000.0),
    }
}

pub fn fmt_cost(cost: f64) -> String {
    if cost > 0.0 {
        format!("${cost:.4}")
    } else {
        "—".to_string()
    }
}

/// Relative idle time from an epoch-seconds timestamp.
pub fn fmt_idle(idle_since: Option<f64>, now: DateTime<Utc>) -> String {
    let Some(since) = idle_since.filter(|since| *since > 0.0) else {
        return "idle".to_string();
    };
    let diff = (now.timestamp_millis() as f64 / 1000.0 - since).max(0.0) as u64;
    match diff {
        0..=59 => "just now".to_string(),
        60..=3_599 => format!("{}m ago", diff / 60),
        3_600..=86_399 => format!("{}h ago", diff / 3_600),
        _ => format!("{}d ago", diff / 86_400),
    }
}

/// Cut `text` to at most `max` characters, marking the cut with `…`.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// Collapse whitespace runs (newlines included) into single spaces.
pub fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
