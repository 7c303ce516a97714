//! Monitor loop — polls every host once per round and reports transitions.
//!
//! Rounds are strictly sequential. A transition awaits the notifier inline,
//! so a round with many transitions is stretched by the notifier's pacing
//! and the effective polling interval grows accordingly.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use hostwatch_core::HostRegistry;
use hostwatch_notify::{NotificationEvent, Notifier};

use crate::probe::{EchoProbe, ProbeError};
use crate::prober::RetryingProber;

/// Errors that stop the monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("probing {host} failed: {source}")]
    Transport {
        host: String,
        #[source]
        source: ProbeError,
    },
}

pub struct Monitor<P> {
    registry: HostRegistry,
    prober: RetryingProber<P>,
    notifier: Notifier,
    interval: Duration,
    /// Notify on the first classification of each host.
    announce_initial: bool,
    rounds: u64,
}

impl<P: EchoProbe> Monitor<P> {
    pub fn new(
        registry: HostRegistry,
        prober: RetryingProber<P>,
        notifier: Notifier,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            prober,
            notifier,
            interval,
            announce_initial: true,
            rounds: 0,
        }
    }

    pub fn announce_initial(mut self, announce: bool) -> Self {
        self.announce_initial = announce;
        self
    }

    pub fn registry(&self) -> &HostRegistry {
        &self.registry
    }

    /// Completed rounds.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Probe every host once, in registry order, notifying transitions as
    /// they are found. Returns the number of notifications sent.
    pub async fn poll_round(&mut self) -> Result<usize, MonitorError> {
        let mut notified = 0;

        for record in self.registry.records_mut() {
            let current = self
                .prober
                .classify(&record.name)
                .await
                .map_err(|source| MonitorError::Transport {
                    host: record.name.clone(),
                    source,
                })?
                .status();
            let previous = record.status;

            let announce = current.is_transition_from(previous)
                && (self.announce_initial || !previous.is_unknown());
            if announce {
                let event = NotificationEvent::new(record.name.clone(), previous, current);
                self.notifier.notify(&event).await;
                notified += 1;
            } else if current.is_transition_from(previous) {
                debug!(host = %record.name, status = %current, "initial status");
            }

            record.status = current;
        }

        self.rounds += 1;
        debug!(round = self.rounds, notified, "round complete");
        Ok(notified)
    }

    /// Poll forever, sleeping `interval` between rounds.
    ///
    /// Returns `Ok` when `shutdown` fires and `Err` on a fatal probe error.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), MonitorError> {
        info!(
            hosts = self.registry.len(),
            interval_secs = self.interval.as_secs(),
            "monitor started"
        );

        loop {
            tokio::select! {
                result = self.poll_round() => {
                    result?;
                }
                _ = shutdown.changed() => {
                    info!("monitor shutting down");
                    return Ok(());
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => {
                    info!("monitor shutting down");
                    return Ok(());
                }
            }
        }
    }
}
