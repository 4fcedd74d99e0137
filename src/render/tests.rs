use std::sync::Arc;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;
use crate::api::{HealthReport, HealthTransition, SessionSummary, VersionInfo};
use crate::bus::{BusEvent, Presenter, SinkUpdate};
use crate::engine::{ConnectionState, Event, LogKind, Provenance};
use crate::testing::log_event;

fn output(presenter: &TerminalPresenter<Vec<u8>>) -> String {
    String::from_utf8(presenter.get_ref().clone()).unwrap()
}

fn batch(updates: Vec<SinkUpdate>) -> Vec<BusEvent> {
    updates
        .into_iter()
        .enumerate()
        .map(|(seq, update)| BusEvent {
            seq: seq as u64,
            update,
        })
        .collect()
}

#[test]
fn test_badge_labels() {
    assert_eq!(badge_label(LogKind::RunStart), "RUN ▶");
    assert_eq!(badge_label(LogKind::ToolEnd), "← TOOL");
    assert_eq!(badge_label(LogKind::Other), "OTHER");
}

#[test]
fn test_fmt_tokens() {
    assert_eq!(fmt_tokens(0), "0");
    assert_eq!(fmt_tokens(999), "999");
    assert_eq!(fmt_tokens(1_240), "1.2K");
    assert_eq!(fmt_tokens(3_450_000), "3.45M");
}

#[test]
fn test_fmt_idle() {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let secs = now.timestamp() as f64;
    assert_eq!(fmt_idle(None, now), "idle");
    assert_eq!(fmt_idle(Some(secs - 30.0), now), "just now");
    assert_eq!(fmt_idle(Some(secs - 600.0), now), "10m ago");
    assert_eq!(fmt_idle(Some(secs - 7_200.0), now), "2h ago");
    assert_eq!(fmt_idle(Some(secs - 3.0 * 86_400.0), now), "3d ago");
}

#[test]
fn test_truncate_and_cost() {
    assert_eq!(truncate("héllo wörld", 5), "héllo…");
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(one_line("a\n  b\tc"), "a b c");
    assert_eq!(fmt_cost(0.0), "—");
    assert_eq!(fmt_cost(0.01234), "$0.0123");
}

#[test]
fn test_log_line_plain() {
    let event = log_event(0, "tool_start", "exec ls -la");
    let line = EventLine {
        event: &event,
        color: false,
    }
    .to_string();
    assert!(line.starts_with('['));
    assert!(line.ends_with("TOOL →  exec ls -la"), "{line}");
}

#[test]
fn test_session_line_lists_blocks() {
    let payload = json!({
        "role": "assistant",
        "blocks": [
            { "type": "text", "content": "Running it\nnow" },
            { "type": "tool_call", "name": "exec", "arguments": { "cmd": "ls" }, "toolCallId": "c1" }
        ]
    });
    let event = Event::from_session(&payload, Provenance::Historical, 0, Utc::now()).unwrap();
    let line = EventLine {
        event: &event,
        color: false,
    }
    .to_string();
    let lines: Vec<&str> = line.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("· assistant"));
    assert!(lines[0].ends_with("Running it now"));
    assert!(lines[1].trim_start().starts_with("→ exec({\"cmd\":\"ls\"})"));
}

#[test]
fn test_presenter_writes_rows_and_state() {
    let mut presenter = TerminalPresenter::new(Vec::new(), false);
    presenter.present(&batch(vec![
        SinkUpdate::Clear,
        SinkUpdate::Append(Arc::new(log_event(0, "error", "boom"))),
        SinkUpdate::EventCount(1),
        SinkUpdate::Connection(ConnectionState::Connected),
        SinkUpdate::Notice("switched to live".into()),
    ]));

    let text = output(&presenter);
    assert!(text.contains("ERROR   boom"));
    assert!(text.contains("● connected (1 events)"));
    assert!(text.contains("» switched to live"));
    assert_eq!(presenter.shown(), 1);
    assert_eq!(presenter.count(), 1);

    presenter.present(&batch(vec![SinkUpdate::DropOldest(1)]));
    assert_eq!(presenter.shown(), 0);
}

#[test]
fn test_presenter_health_only_on_transition() {
    let mut presenter = TerminalPresenter::new(Vec::new(), false);
    let steady = HealthReport {
        online: true,
        status: None,
        transition: None,
        error: None,
    };
    let dropped = HealthReport {
        online: false,
        status: None,
        transition: Some(HealthTransition::WentOffline),
        error: Some("connection refused".into()),
    };
    presenter.present(&batch(vec![
        SinkUpdate::Health(steady),
        SinkUpdate::Health(dropped),
    ]));

    let text = output(&presenter);
    assert_eq!(
        text,
        "gateway offline, waiting for it to come back (connection refused)\n"
    );
}

#[test]
fn test_presenter_sessions_and_system() {
    let mut presenter = TerminalPresenter::new(Vec::new(), false);
    let sessions = vec![SessionSummary {
        id: "0123abcd-4567-89ab".into(),
        status: Some("processing".into()),
        message_count: 4,
        model: Some("sonnet".into()),
        label_type: Some("cron".into()),
        ..SessionSummary::default()
    }];
    presenter.present(&batch(vec![
        SinkUpdate::Sessions(Arc::new(sessions)),
        SinkUpdate::System(Arc::new(json!({ "presence": { "online": 2 } }))),
        SinkUpdate::Version(VersionInfo {
            version: Some("1.4.0".into()),
            hash: Some("abc1234".into()),
            date: None,
        }),
    ]));

    let text = output(&presenter);
    assert!(text.contains("Cron"));
    assert!(text.contains("processing"));
    assert!(text.contains("0123abcd… · 4 msgs · sonnet"));
    assert!(text.contains("1 active"));
    assert!(text.contains("presence"));
    assert!(text.contains("openclaw monitor 1.4.0 (abc1234)"));
}

#[test]
fn test_stream_error_line() {
    let mut presenter = TerminalPresenter::new(Vec::new(), false);
    presenter.present(&batch(vec![SinkUpdate::StreamError("session not found".into())]));
    assert_eq!(output(&presenter), "stream error: session not found\n");
}
