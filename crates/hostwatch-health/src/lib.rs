//! hostwatch-health — liveness probing and the monitor loop.
//!
//! # Architecture
//!
//! ```text
//! Monitor
//!   ├── HostRegistry (file order, one record per line)
//!   ├── RetryingProber
//!   │   └── EchoProbe (system ping or TCP connect)
//!   └── Notifier (shared pacing gate)
//! ```
//!
//! Everything runs on one logical thread of control: hosts are probed one
//! after another, and a transition blocks the round until the notifier has
//! dispatched it.
//!
//! # Retry schedule
//!
//! Each host gets an escalating per-attempt timeout (1s, 6s, 11s, ...) until
//! one probe answers or the cumulative budget (60s) is spent. A transport
//! failure on the local side aborts the whole monitor.

pub mod monitor;
pub mod probe;
pub mod prober;

pub use monitor::{Monitor, MonitorError};
pub use probe::{AnyProbe, EchoProbe, ProbeError, ProbeResult, SystemPing, TcpConnectProbe};
pub use prober::{Classification, RetryingProber, RetrySchedule};
