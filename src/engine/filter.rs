//! Category filter and text search predicates.

use std::fmt;
use std::str::FromStr;

use super::event::{Event, LogKind};

/// Named group of log kinds a user can narrow the stream to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CategoryFilter {
    #[default]
    All,
    Queue,
    Run,
    Tool,
    Session,
    Error,
}

impl CategoryFilter {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Queue => "queue",
            Self::Run => "run",
            Self::Tool => "tool",
            Self::Session => "session",
            Self::Error => "error",
        }
    }

    pub const fn all() -> &'static [CategoryFilter] {
        &[
            Self::All,
            Self::Queue,
            Self::Run,
            Self::Tool,
            Self::Session,
            Self::Error,
        ]
    }

    /// Kinds admitted by this filter. Empty for `All`, which admits everything.
    pub const fn kinds(&self) -> &'static [LogKind] {
        match self {
            Self::All => &[],
            Self::Queue => &[LogKind::Enqueue, LogKind::Dequeue],
            Self::Run => &[LogKind::RunStart, LogKind::RunDone],
            Self::Tool => &[LogKind::ToolStart, LogKind::ToolEnd],
            Self::Session => &[LogKind::SessionState],
            Self::Error => &[LogKind::Error, LogKind::Warn],
        }
    }

    pub fn admits(&self, kind: LogKind) -> bool {
        *self == Self::All || self.kinds().contains(&kind)
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "queue" => Ok(Self::Queue),
            "run" => Ok(Self::Run),
            "tool" => Ok(Self::Tool),
            "session" => Ok(Self::Session),
            "error" => Ok(Self::Error),
            _ => Err(format!(
                "unknown filter '{value}'. Use all, queue, run, tool, session, or error"
            )),
        }
    }
}

/// Category half of the predicate. Session messages carry no log kind and
/// always pass.
pub fn category_match(kind: Option<LogKind>, filter: CategoryFilter) -> bool {
    kind.map_or(true, |kind| filter.admits(kind))
}

/// Case-insensitive substring test. An empty query matches everything.
pub fn search_match(text: &str, query: &str) -> bool {
    query.is_empty() || text.to_lowercase().contains(&query.to_lowercase())
}

/// Process-wide filter and search selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    category: CategoryFilter,
    query: String,
    needle: String,
}

impl FilterState {
    pub fn new(category: CategoryFilter, query: impl Into<String>) -> Self {
        let mut state = Self {
            category,
            ..Self::default()
        };
        state.set_query(query);
        state
    }

    pub fn category(&self) -> CategoryFilter {
        self.category
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Returns true when the selection changed.
    pub fn set_category(&mut self, category: CategoryFilter) -> bool {
        let changed = self.category != category;
        self.category = category;
        changed
    }

    /// Returns true when the query changed.
    pub fn set_query(&mut self, query: impl Into<String>) -> bool {
        let query = query.into();
        if query == self.query {
            return false;
        }
        self.needle = query.to_lowercase();
        self.query = query;
        true
    }

    /// Combined predicate: category match AND search match. Session
    /// messages are a transcript and always show; the selection only applies
    /// to log rows.
    pub fn visible(&self, event: &Event) -> bool {
        match event.kind() {
            None => true,
            Some(kind) => {
                category_match(Some(kind), self.category)
                    && (self.needle.is_empty() || event.raw.to_lowercase().contains(&self.needle))
            }
        }
    }
}
