use std::fmt;

use chrono::Utc;
use owo_colors::OwoColorize;
use serde_json::Value;

use super::format::{badge_label, fmt_cost, fmt_idle, fmt_time, fmt_tokens, one_line, truncate};
use crate::api::{short_id, HealthReport, HealthTransition, SessionSummary, VersionInfo};
use crate::engine::{Block, ConnectionState, Event, EventBody, LogKind, Role, SessionMessage};

const TEXT_WIDTH: usize = 200;
const DETAIL_WIDTH: usize = 100;

/// One buffered event as terminal line(s).
pub struct EventLine<'a> {
    pub event: &'a Event,
    pub color: bool,
}

impl fmt::Display for EventLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = format!("[{}]", fmt_time(self.event.timestamp));
        let time = if self.color {
            time.bright_black().to_string()
        } else {
            time
        };

        match &self.event.body {
            EventBody::Log(kind) => {
                let badge = format!("{:<7}", badge_label(*kind));
                write!(f, "{} {} {}", time, paint_badge(&badge, *kind, self.color), self.event.raw)
            }
            EventBody::Session(message) => {
                let marker = if self.event.is_historical() { "·" } else { "▸" };
                let role = format!("{:<9}", role_label(message.role));
                let head = if self.color {
                    format!("{} {}", marker.bright_black(), paint_role(&role, message.role))
                } else {
                    format!("{marker} {role}")
                };
                write!(f, "{time} {head}")?;
                write_session_body(f, message, self.color)
            }
        }
    }
}

fn paint_badge(badge: &str, kind: LogKind, color: bool) -> String {
    if !color {
        return badge.to_string();
    }
    match kind {
        LogKind::Error => badge.red().bold().to_string(),
        LogKind::Warn => badge.yellow().to_string(),
        LogKind::ToolStart | LogKind::ToolEnd => badge.cyan().to_string(),
        LogKind::RunStart | LogKind::RunDone => badge.green().to_string(),
        LogKind::Enqueue | LogKind::Dequeue => badge.blue().to_string(),
        LogKind::SessionState => badge.magenta().to_string(),
        LogKind::Other => badge.dimmed().to_string(),
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::ToolResult => "tool",
        Role::Meta => "meta",
        Role::Unknown => "?",
    }
}

fn paint_role(label: &str, role: Role) -> String {
    match role {
        Role::User => label.bold().to_string(),
        Role::Assistant => label.cyan().to_string(),
        Role::ToolResult => label.green().to_string(),
        Role::Meta | Role::Unknown => label.dimmed().to_string(),
    }
}

fn write_session_body(
    f: &mut fmt::Formatter<'_>,
    message: &SessionMessage,
    color: bool,
) -> fmt::Result {
    if message.role == Role::Meta {
        if let Some(meta) = &message.meta {
            write!(f, " {}", truncate(&meta.to_string(), TEXT_WIDTH))?;
        }
        return Ok(());
    }
    if message.blocks.is_empty() {
        return write!(f, " (empty)");
    }

    for (index, block) in message.blocks.iter().enumerate() {
        let line = block_line(block);
        let line = if color && matches!(block, Block::Thinking { .. }) {
            line.dimmed().to_string()
        } else {
            line
        };
        if index == 0 {
            write!(f, " {line}")?;
        } else {
            write!(f, "\n{:>23}{line}", "")?;
        }
    }
    Ok(())
}

fn block_line(block: &Block) -> String {
    match block {
        Block::Text { content } => truncate(&one_line(content), TEXT_WIDTH),
        Block::Thinking { content } => {
            format!("thinking: {}", truncate(&one_line(content), DETAIL_WIDTH))
        }
        Block::ToolCall {
            name, arguments, ..
        } => format!("→ {name}({})", truncate(&compact(arguments), DETAIL_WIDTH)),
        Block::ToolResult { content } => {
            format!("← {}", truncate(&one_line(&compact(content)), DETAIL_WIDTH))
        }
    }
}

/// Strings unquoted, everything else as compact JSON.
fn compact(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Connection indicator with the buffered event count.
pub struct ConnectionLine {
    pub state: ConnectionState,
    pub count: usize,
    pub color: bool,
}

impl fmt::Display for ConnectionLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = format!("● {}", self.state);
        let label = if !self.color {
            label
        } else {
            match self.state {
                ConnectionState::Connected => label.green().to_string(),
                ConnectionState::Connecting => label.yellow().to_string(),
                ConnectionState::Disconnected => label.red().to_string(),
                ConnectionState::Idle => label.dimmed().to_string(),
            }
        };
        write!(f, "{label} ({} events)", self.count)
    }
}

pub struct HealthLine<'a> {
    pub report: &'a HealthReport,
    pub color: bool,
}

impl fmt::Display for HealthLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match (self.report.transition, self.report.online) {
            (Some(HealthTransition::WentOffline), _) => "gateway offline, waiting for it to come back",
            (Some(HealthTransition::CameOnline), _) => "gateway back online",
            (None, true) => "gateway online",
            (None, false) => "gateway offline",
        };
        let written = match (self.color, self.report.online) {
            (true, true) => write!(f, "{}", text.green()),
            (true, false) => write!(f, "{}", text.red()),
            (false, _) => f.write_str(text),
        };
        written?;
        if let Some(error) = &self.report.error {
            write!(f, " ({error})")?;
        }
        Ok(())
    }
}

/// One row of the session directory.
pub struct SessionCard<'a> {
    pub session: &'a SessionSummary,
    pub color: bool,
}

impl fmt::Display for SessionCard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = self.session;
        let label = format!("{:<24}", truncate(&session.display_label(), 24));
        let status = if session.is_processing() {
            "processing".to_string()
        } else {
            fmt_idle(session.idle_since, Utc::now())
        };
        let status = format!("{status:<11}");
        let model = session.model.as_deref().unwrap_or("—");
        let tokens = session
            .usage
            .as_ref()
            .filter(|usage| usage.total_tokens > 0)
            .map(|usage| format!(" · {} tok {}", fmt_tokens(usage.total_tokens), fmt_cost(usage.cost)))
            .unwrap_or_default();

        if self.color {
            let status = if session.is_processing() {
                status.yellow().to_string()
            } else {
                status.dimmed().to_string()
            };
            write!(
                f,
                "{} {} {} · {} msgs · {}{}",
                label.bold(),
                status,
                short_id(&session.id).bright_black(),
                session.message_count,
                model,
                tokens
            )
        } else {
            write!(
                f,
                "{} {} {} · {} msgs · {}{}",
                label,
                status,
                short_id(&session.id),
                session.message_count,
                model,
                tokens
            )
        }
    }
}

/// Top-level keys of the system snapshot, one per line.
pub struct SystemView<'a> {
    pub snapshot: &'a Value,
    pub color: bool,
}

impl fmt::Display for SystemView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(object) = self.snapshot.as_object() else {
            return write!(f, "{}", truncate(&self.snapshot.to_string(), TEXT_WIDTH));
        };
        if object.is_empty() {
            return f.write_str("(no system data)");
        }
        for (index, (key, value)) in object.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            let key = format!("{key:<20}");
            let value = truncate(&compact(value), DETAIL_WIDTH);
            if self.color {
                write!(f, "{} {}", key.cyan(), value)?;
            } else {
                write!(f, "{key} {value}")?;
            }
        }
        Ok(())
    }
}

pub struct VersionLine<'a> {
    pub version: &'a VersionInfo,
}

impl fmt::Display for VersionLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "openclaw monitor {}",
            self.version.version.as_deref().unwrap_or("unknown")
        )?;
        let details: Vec<&str> = [self.version.hash.as_deref(), self.version.date.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !details.is_empty() {
            write!(f, " ({})", details.join(", "))?;
        }
        Ok(())
    }
}
