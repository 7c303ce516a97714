//! hostwatch-notify — outbound transition notifications.
//!
//! ```text
//! Notifier
//!   ├── pacing gate (min spacing between dispatches, settle delay after)
//!   ├── log sink    → "Host X down."
//!   └── relay sink  → "<origin>: MMDDHHmm Host X down."
//! ```
//!
//! One `Notifier` exists per process. It owns the pacing state, so every
//! transition on every host passes through the same gate.

pub mod event;
pub mod notifier;
pub mod sink;

pub use event::{relay_line, NotificationEvent};
pub use notifier::Notifier;
pub use sink::{CommandSink, NotifySink, SinkError};

#[cfg(unix)]
pub use sink::SyslogSink;
