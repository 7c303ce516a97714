//! Paced dispatch of transition notifications.
//!
//! The relay behind the sinks is a shared, rate-limited channel, so the
//! notifier enforces a minimum spacing between consecutive dispatches and a
//! short settle delay after each one. The gate is process-wide: transitions
//! on different hosts queue behind each other.

use std::time::Duration;

use chrono::Local;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use hostwatch_core::config::{DEFAULT_MIN_SPACING, DEFAULT_SETTLE_DELAY};

use crate::event::{relay_line, NotificationEvent};
use crate::sink::NotifySink;

pub struct Notifier {
    log_sink: Box<dyn NotifySink>,
    relay: Option<Box<dyn NotifySink>>,
    /// Local host identity, prefixed to relay lines.
    origin: String,
    min_spacing: Duration,
    settle_delay: Duration,
    /// Start of the previous dispatch.
    last_sent: Option<Instant>,
}

impl Notifier {
    pub fn new(log_sink: Box<dyn NotifySink>, origin: impl Into<String>) -> Self {
        Self {
            log_sink,
            relay: None,
            origin: origin.into(),
            min_spacing: DEFAULT_MIN_SPACING,
            settle_delay: DEFAULT_SETTLE_DELAY,
            last_sent: None,
        }
    }

    pub fn with_relay(mut self, relay: Box<dyn NotifySink>) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn with_pacing(mut self, min_spacing: Duration, settle_delay: Duration) -> Self {
        self.min_spacing = min_spacing;
        self.settle_delay = settle_delay;
        self
    }

    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    /// Dispatch one event to every sink.
    ///
    /// Waits until `min_spacing` has passed since the previous dispatch,
    /// then writes the message, then sleeps `settle_delay`. The relay line is
    /// stamped with the dispatch time, not `event.at`. Sink failures are
    /// logged and swallowed.
    pub async fn notify(&mut self, event: &NotificationEvent) {
        if let Some(last) = self.last_sent {
            let elapsed = last.elapsed();
            if elapsed < self.min_spacing {
                let wait = self.min_spacing - elapsed;
                debug!(
                    host = %event.host,
                    wait_ms = wait.as_millis() as u64,
                    "pacing notification"
                );
                tokio::time::sleep_until(last + self.min_spacing).await;
            }
        }
        self.last_sent = Some(Instant::now());
        let sent_at = Local::now();

        let message = event.message();
        if let Err(e) = self.log_sink.dispatch(&message) {
            warn!(sink = self.log_sink.name(), error = %e, "notification dispatch failed");
        }

        if let Some(relay) = &self.relay {
            let line = relay_line(&self.origin, sent_at, &message);
            if let Err(e) = relay.dispatch(&line) {
                warn!(sink = relay.name(), error = %e, "notification dispatch failed");
            }
        }

        info!(
            host = %event.host,
            previous = %event.previous,
            current = %event.current,
            "{message}"
        );

        tokio::time::sleep(self.settle_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use hostwatch_core::Status;

    use crate::sink::SinkError;

    #[derive(Clone, Default)]
    struct Recorder {
        lines: Arc<Mutex<Vec<(Instant, String)>>>,
    }

    impl Recorder {
        fn lines(&self) -> Vec<(Instant, String)> {
            self.lines.lock().unwrap().clone()
        }
    }

    impl NotifySink for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn dispatch(&self, line: &str) -> Result<(), SinkError> {
            self.lines
                .lock()
                .unwrap()
                .push((Instant::now(), line.to_string()));
            Ok(())
        }
    }

    struct Broken;

    impl NotifySink for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn dispatch(&self, _line: &str) -> Result<(), SinkError> {
            Err(SinkError::EmptyCommand)
        }
    }

    fn down(host: &str) -> NotificationEvent {
        NotificationEvent::new(host, Status::Up(5), Status::Down)
    }

    #[tokio::test(start_paused = true)]
    async fn first_notification_is_not_delayed() {
        let log = Recorder::default();
        let mut notifier = Notifier::new(Box::new(log.clone()), "gw01");

        let start = Instant::now();
        notifier.notify(&down("db")).await;

        let lines = log.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, start);
        assert_eq!(lines[0].1, "Host db down.");
        // Settle delay.
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_is_spaced_by_min_spacing() {
        let log = Recorder::default();
        let mut notifier = Notifier::new(Box::new(log.clone()), "gw01");

        for host in ["a", "b", "c", "d"] {
            notifier.notify(&down(host)).await;
        }

        let lines = log.lines();
        assert_eq!(lines.len(), 4);
        for pair in lines.windows(2) {
            assert_eq!(pair[1].0 - pair[0].0, Duration::from_secs(30));
        }
        let order: Vec<_> = lines.iter().map(|(_, l)| l.as_str()).collect();
        assert_eq!(
            order,
            ["Host a down.", "Host b down.", "Host c down.", "Host d down."]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn spacing_is_measured_from_last_dispatch() {
        let log = Recorder::default();
        let mut notifier = Notifier::new(Box::new(log.clone()), "gw01");

        notifier.notify(&down("a")).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        notifier.notify(&down("b")).await;

        let lines = log.lines();
        // 1s settle + 10s idle already elapsed; waits only the remaining 19s.
        assert_eq!(lines[1].0 - lines[0].0, Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(45)).await;
        let before = Instant::now();
        notifier.notify(&down("c")).await;
        assert_eq!(log.lines()[2].0, before);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_pacing() {
        let log = Recorder::default();
        let mut notifier = Notifier::new(Box::new(log.clone()), "gw01")
            .with_pacing(Duration::from_secs(5), Duration::ZERO);

        notifier.notify(&down("a")).await;
        notifier.notify(&down("b")).await;

        let lines = log.lines();
        assert_eq!(lines[1].0 - lines[0].0, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn relay_line_is_prefixed_with_origin() {
        let log = Recorder::default();
        let relay = Recorder::default();
        let mut notifier =
            Notifier::new(Box::new(log.clone()), "gw01").with_relay(Box::new(relay.clone()));

        let event = NotificationEvent::new("db", Status::Down, Status::Up(12));
        let before = Local::now();
        notifier.notify(&event).await;
        let after = Local::now();

        let line = &relay.lines()[0].1;
        let stamped = |at: chrono::DateTime<Local>| {
            format!("gw01: {} Host db alive (12ms).", at.format("%m%d%H%M"))
        };
        assert!(*line == stamped(before) || *line == stamped(after), "{line}");
        assert_eq!(log.lines()[0].1, "Host db alive (12ms).");
    }

    #[tokio::test(start_paused = true)]
    async fn relay_stamp_is_dispatch_time() {
        let log = Recorder::default();
        let relay = Recorder::default();
        let mut notifier = Notifier::new(Box::new(log.clone()), "gw")
            .with_relay(Box::new(relay.clone()))
            .with_pacing(Duration::ZERO, Duration::ZERO);

        let mut event = down("db");
        event.at = Local::now() - chrono::Duration::minutes(3);
        let before = Local::now().format("%m%d%H%M").to_string();
        notifier.notify(&event).await;
        let after = Local::now().format("%m%d%H%M").to_string();

        let line = &relay.lines()[0].1;
        let stamp = line
            .strip_prefix("gw: ")
            .and_then(|rest| rest.strip_suffix(" Host db down."))
            .unwrap();
        assert!(stamp == before || stamp == after, "{line}");
        assert_ne!(stamp, event.at.format("%m%d%H%M").to_string());
    }

    #[tokio::test(start_paused = true)]
    async fn sink_failure_is_not_fatal() {
        let relay = Recorder::default();
        let mut notifier =
            Notifier::new(Box::new(Broken), "gw01").with_relay(Box::new(relay.clone()));

        notifier.notify(&down("a")).await;
        notifier.notify(&down("b")).await;

        assert_eq!(relay.lines().len(), 2);
        assert!(notifier.last_sent().is_some());
    }
}
