//! hostwatch-core — shared types for the hostwatch liveness monitor.
//!
//! Holds the host status model, the ordered host registry loaded from the
//! hosts file, and the daemon configuration (TOML file + defaults).

pub mod config;
pub mod error;
pub mod registry;
pub mod types;

pub use config::{NotifySettings, ProbeKind, ProbeSettings, Settings};
pub use error::{ConfigError, ConfigResult};
pub use registry::{HostRecord, HostRegistry};
pub use types::{Reachability, Status};
