use std::io::{self, Write};

use owo_colors::OwoColorize;

use super::view::{ConnectionLine, EventLine, HealthLine, SessionCard, SystemView, VersionLine};
use crate::api::active_count;
use crate::bus::{BusEvent, Presenter, SinkUpdate};
use crate::engine::ConnectionState;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Line-oriented terminal output for bus updates.
///
/// A terminal cannot take back lines it already printed, so `DropOldest` only
/// adjusts bookkeeping; `Clear` wipes the screen when ANSI output is enabled
/// and prints a divider otherwise.
pub struct TerminalPresenter<W> {
    out: W,
    color: bool,
    state: ConnectionState,
    count: usize,
    shown: usize,
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            state: ConnectionState::Idle,
            count: 0,
            shown: 0,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Rows printed since the last clear that the buffer still holds.
    pub fn shown(&self) -> usize {
        self.shown
    }

    pub fn count(&self) -> usize {
        self.count
    }

    fn write_update(&mut self, update: &SinkUpdate) -> io::Result<()> {
        let color = self.color;
        match update {
            SinkUpdate::Append(event) => {
                self.shown += 1;
                writeln!(self.out, "{}", EventLine { event, color })
            }
            SinkUpdate::DropOldest(count) => {
                self.shown = self.shown.saturating_sub(*count);
                Ok(())
            }
            SinkUpdate::EventCount(count) => {
                self.count = *count;
                Ok(())
            }
            SinkUpdate::Clear => {
                self.shown = 0;
                if color {
                    write!(self.out, "{CLEAR_SCREEN}")
                } else {
                    writeln!(self.out, "{}", "-".repeat(40))
                }
            }
            SinkUpdate::Connection(state) => {
                self.state = *state;
                let line = ConnectionLine {
                    state: *state,
                    count: self.count,
                    color,
                };
                writeln!(self.out, "{line}")
            }
            SinkUpdate::StreamError(message) => {
                self.shown = 0;
                if color {
                    writeln!(self.out, "{} {}", "stream error:".red().bold(), message)
                } else {
                    writeln!(self.out, "stream error: {message}")
                }
            }
            SinkUpdate::Health(report) => {
                // Steady state stays quiet; only edges are worth a line.
                if report.transition.is_some() {
                    writeln!(self.out, "{}", HealthLine { report, color })
                } else {
                    Ok(())
                }
            }
            SinkUpdate::Sessions(sessions) => {
                if sessions.is_empty() {
                    return writeln!(self.out, "no sessions");
                }
                for session in sessions.iter() {
                    writeln!(self.out, "{}", SessionCard { session, color })?;
                }
                let active = active_count(sessions);
                if active > 0 {
                    writeln!(self.out, "{active} active")?;
                }
                Ok(())
            }
            SinkUpdate::System(snapshot) => {
                writeln!(self.out, "{}", SystemView { snapshot, color })
            }
            SinkUpdate::Version(version) => writeln!(self.out, "{}", VersionLine { version }),
            SinkUpdate::Notice(message) => {
                if color {
                    writeln!(self.out, "{}", format!("» {message}").dimmed())
                } else {
                    writeln!(self.out, "» {message}")
                }
            }
        }
    }
}

impl<W: Write + Send + 'static> Presenter for TerminalPresenter<W> {
    fn present(&mut self, batch: &[BusEvent]) {
        for event in batch {
            if let Err(e) = self.write_update(&event.update) {
                tracing::warn!("failed to write {} update: {e}", event.update.kind());
                return;
            }
        }
        if let Err(e) = self.out.flush() {
            tracing::warn!("failed to flush terminal output: {e}");
        }
    }
}
