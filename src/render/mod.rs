//! Terminal rendering of stream events and polled backend state.

mod format;
mod presenter;
mod view;

#[cfg(test)]
mod tests;

pub use format::{badge_label, fmt_cost, fmt_idle, fmt_time, fmt_tokens, one_line, truncate};
pub use presenter::TerminalPresenter;
pub use view::{ConnectionLine, EventLine, HealthLine, SessionCard, SystemView, VersionLine};
