//! Transition events and their text forms.

use chrono::{DateTime, Local};

use hostwatch_core::Status;

/// A host crossed the up/down boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub host: String,
    pub previous: Status,
    pub current: Status,
    /// When the transition was observed.
    pub at: DateTime<Local>,
}

impl NotificationEvent {
    pub fn new(host: impl Into<String>, previous: Status, current: Status) -> Self {
        Self {
            host: host.into(),
            previous,
            current,
            at: Local::now(),
        }
    }

    /// Human-readable message for the log sink.
    pub fn message(&self) -> String {
        match self.current {
            Status::Up(ms) => format!("Host {} alive ({ms}ms).", self.host),
            Status::Down => format!("Host {} down.", self.host),
            Status::Unknown => format!("Host {} status unknown.", self.host),
        }
    }
}

/// Relay form of a message: `<origin>: <MMDDHHmm> <message>`.
pub fn relay_line(origin: &str, at: DateTime<Local>, message: &str) -> String {
    format!("{origin}: {} {message}", at.format("%m%d%H%M"))
}
