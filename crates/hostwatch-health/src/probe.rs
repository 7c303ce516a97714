//! Echo probe adapters.
//!
//! A probe performs one reachability exchange bounded by a timeout and
//! reports the round trip. Failures are split into a retryable timeout and
//! a fatal transport error that means the local probing mechanism is broken.

use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;

use hostwatch_core::{ProbeKind, ProbeSettings};

/// Extra time given to the ping child beyond its own `-W` deadline.
const SPAWN_GRACE: Duration = Duration::from_secs(1);

/// Output fragments that mean the local side can't probe at all.
const TRANSPORT_MARKERS: &[&str] = &[
    "operation not permitted",
    "permission denied",
    "socket:",
    "administratively prohibited",
    "communication prohibited",
];

static RTT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"time[=<]\s*([0-9]+(?:\.[0-9]+)?)\s*ms").expect("valid rtt regex")
});

/// Round trip of a successful probe.
pub type ProbeResult = Result<Duration, ProbeError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// No reply in time. Retryable.
    #[error("no echo reply")]
    Timeout,

    /// The local probing mechanism failed. Fatal.
    #[error("probe transport failure: {0}")]
    Transport(String),
}

impl ProbeError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProbeError::Transport(_))
    }
}

/// One echo exchange with `host`, bounded by `timeout`.
pub trait EchoProbe {
    fn probe(&self, host: &str, timeout: Duration) -> impl Future<Output = ProbeResult> + Send;
}

/// Probes through the system `ping` binary, one packet per attempt.
#[derive(Debug, Clone)]
pub struct SystemPing {
    program: PathBuf,
}

impl Default for SystemPing {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ping"),
        }
    }
}

impl SystemPing {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl EchoProbe for SystemPing {
    async fn probe(&self, host: &str, timeout: Duration) -> ProbeResult {
        let wait_secs = timeout.as_secs().max(1);
        let started = Instant::now();

        let child = tokio::process::Command::new(&self.program)
            .args(["-n", "-c", "1", "-W"])
            .arg(wait_secs.to_string())
            .arg(host)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProbeError::Transport(format!("can't run {}: {e}", self.program.display()))
            })?;

        let deadline = Duration::from_secs(wait_secs) + SPAWN_GRACE;
        let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ProbeError::Transport(format!(
                    "waiting for {} failed: {e}",
                    self.program.display()
                )));
            }
            Err(_) => {
                debug!(%host, timeout_secs = wait_secs, "ping outlived its deadline");
                return Err(ProbeError::Timeout);
            }
        };

        interpret_ping(host, &output, started.elapsed())
    }
}

/// Map a finished ping run to a probe result. `elapsed` is used when the
/// reply line carries no parseable round trip.
fn interpret_ping(host: &str, output: &Output, elapsed: Duration) -> ProbeResult {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if output.status.success() {
        return Ok(parse_rtt(&stdout).unwrap_or(elapsed));
    }

    let combined = format!("{stdout}\n{stderr}").to_lowercase();
    if let Some(marker) = TRANSPORT_MARKERS.iter().find(|m| combined.contains(*m)) {
        return Err(ProbeError::Transport(format!(
            "ping {host}: {}",
            first_line_containing(&combined, marker)
        )));
    }

    debug!(%host, status = %output.status, "no echo reply");
    Err(ProbeError::Timeout)
}

fn parse_rtt(stdout: &str) -> Option<Duration> {
    let caps = RTT_RE.captures(stdout)?;
    let ms: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(Duration::from_secs_f64(ms / 1000.0))
}

fn first_line_containing<'a>(text: &'a str, marker: &'a str) -> &'a str {
    text.lines()
        .find(|line| line.contains(marker))
        .map(str::trim)
        .unwrap_or(marker)
}

/// Probes by opening a TCP connection. An accepted or actively refused
/// connection both prove the host answered.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnectProbe {
    port: u16,
}

impl TcpConnectProbe {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

impl EchoProbe for TcpConnectProbe {
    async fn probe(&self, host: &str, timeout: Duration) -> ProbeResult {
        let started = Instant::now();
        match tokio::time::timeout(timeout, TcpStream::connect((host, self.port))).await {
            Ok(Ok(_stream)) => Ok(started.elapsed()),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => Ok(started.elapsed()),
            Ok(Err(e)) if e.kind() == ErrorKind::PermissionDenied => Err(ProbeError::Transport(
                format!("connect {host}:{}: {e}", self.port),
            )),
            Ok(Err(e)) => {
                debug!(%host, port = self.port, error = %e, "tcp probe failed");
                Err(ProbeError::Timeout)
            }
            Err(_) => Err(ProbeError::Timeout),
        }
    }
}

/// The probe selected by configuration.
#[derive(Debug, Clone)]
pub enum AnyProbe {
    Ping(SystemPing),
    Tcp(TcpConnectProbe),
}

impl AnyProbe {
    pub fn from_settings(settings: &ProbeSettings) -> Self {
        match settings.kind {
            ProbeKind::Ping => AnyProbe::Ping(SystemPing::default()),
            ProbeKind::Tcp => AnyProbe::Tcp(TcpConnectProbe::new(settings.port)),
        }
    }
}

impl EchoProbe for AnyProbe {
    async fn probe(&self, host: &str, timeout: Duration) -> ProbeResult {
        match self {
            AnyProbe::Ping(p) => p.probe(host, timeout).await,
            AnyProbe::Tcp(p) => p.probe(host, timeout).await,
        }
    }
}
