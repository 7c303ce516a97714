//! Retry-with-backoff classification of a single host.
//!
//! Each attempt gets a longer timeout than the previous one, so transient
//! congestion is given a wider window on later tries. The sum of attempted
//! timeouts never exceeds the budget; the last attempt is clamped to what
//! is left of it.

use std::time::Duration;

use tracing::{debug, error};

use hostwatch_core::config::{DEFAULT_MAX_WAIT, DEFAULT_STEP};
use hostwatch_core::{ProbeSettings, Status};

use crate::probe::{EchoProbe, ProbeError};

const INITIAL_WAIT: Duration = Duration::from_secs(1);

/// Outcome of probing one host for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Reachable { latency_ms: u64 },
    Down,
}

impl Classification {
    pub fn status(&self) -> Status {
        match self {
            Classification::Reachable { latency_ms } => Status::Up(*latency_ms),
            Classification::Down => Status::Down,
        }
    }
}

/// Escalating per-attempt timeouts bounded by a total budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySchedule {
    max_wait: Duration,
    step: Duration,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WAIT, DEFAULT_STEP)
    }
}

impl RetrySchedule {
    pub fn new(max_wait: Duration, step: Duration) -> Self {
        Self { max_wait, step }
    }

    pub fn from_settings(settings: &ProbeSettings) -> Self {
        Self::new(settings.max_wait, settings.step)
    }

    /// Timeouts to try, in order. Always yields at least one.
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            next_wait: INITIAL_WAIT,
            spent: Duration::ZERO,
            attempts: 0,
            schedule: *self,
        }
    }
}

/// Iterator over the attempt timeouts of a [`RetrySchedule`].
///
/// Each timeout grows by `step`, but the iterator stops once the timeouts
/// handed out add up to `max_wait`, clamping the last one to the remainder.
/// With the defaults that is 1, 6, 11, 16, 21, 5 seconds: six attempts,
/// rather than the twelve (1 through 56) a loop bounding only the single
/// attempt timeout by `max_wait` would make.
#[derive(Debug, Clone)]
pub struct Timeouts {
    next_wait: Duration,
    spent: Duration,
    attempts: u32,
    schedule: RetrySchedule,
}

impl Iterator for Timeouts {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let remaining = self.schedule.max_wait.saturating_sub(self.spent);
        let timeout = if remaining.is_zero() {
            if self.attempts > 0 {
                return None;
            }
            self.next_wait
        } else {
            self.next_wait.min(remaining)
        };

        self.spent += timeout;
        self.attempts += 1;
        self.next_wait += self.schedule.step;
        Some(timeout)
    }
}

/// Classifies hosts as reachable or down using an [`EchoProbe`].
pub struct RetryingProber<P> {
    probe: P,
    schedule: RetrySchedule,
}

impl<P: EchoProbe> RetryingProber<P> {
    pub fn new(probe: P, schedule: RetrySchedule) -> Self {
        Self { probe, schedule }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Probe `host` until it answers or the schedule runs out.
    ///
    /// A transport error is returned at once and never retried.
    pub async fn classify(&self, host: &str) -> Result<Classification, ProbeError> {
        for (attempt, timeout) in self.schedule.timeouts().enumerate() {
            match self.probe.probe(host, timeout).await {
                Ok(rtt) => {
                    let latency_ms = rtt.as_millis() as u64;
                    debug!(%host, attempt, latency_ms, "echo reply");
                    return Ok(Classification::Reachable { latency_ms });
                }
                Err(ProbeError::Timeout) => {
                    debug!(%host, attempt, timeout_secs = timeout.as_secs(), "no reply");
                }
                Err(e @ ProbeError::Transport(_)) => {
                    error!(%host, error = %e, "probe transport failure");
                    return Err(e);
                }
            }
        }

        debug!(%host, "no reply within retry budget");
        Ok(Classification::Down)
    }
}
