//! Host status model.

use std::fmt;

/// Last-known status of a monitored host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// Not classified yet.
    #[default]
    Unknown,
    /// Answered during the last round; round trip in milliseconds.
    Up(u64),
    /// No answer within the retry budget.
    Down,
}

/// Coarse reachability kind, ignoring latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Up,
    Down,
}

impl Status {
    /// Coarse kind of this status. `Unknown` has none, so it never matches
    /// a concrete status.
    pub fn reachability(&self) -> Option<Reachability> {
        match self {
            Status::Unknown => None,
            Status::Up(_) => Some(Reachability::Up),
            Status::Down => Some(Reachability::Down),
        }
    }

    /// Whether moving from `previous` to `self` crosses the up/down boundary.
    pub fn is_transition_from(&self, previous: Status) -> bool {
        self.reachability() != previous.reachability()
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Status::Unknown)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unknown => f.write_str("unknown"),
            Status::Up(ms) => write!(f, "up ({ms}ms)"),
            Status::Down => f.write_str("down"),
        }
    }
}
