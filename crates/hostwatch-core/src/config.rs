//! hostwatch.toml configuration parser.
//!
//! Every field of the file is optional; missing values fall back to the
//! defaults in [`Settings::default`]. Command-line flags are applied on top
//! by the daemon.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_HOSTS_FILE: &str = "/etc/hostwatch.hosts";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60);
pub const DEFAULT_STEP: Duration = Duration::from_secs(5);
pub const DEFAULT_MIN_SPACING: Duration = Duration::from_secs(30);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_SYSLOG_IDENT: &str = "hostwatch";
pub const DEFAULT_TCP_PORT: u16 = 7;

/// Raw file layout.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub interval: Option<String>,
    pub hosts_file: Option<PathBuf>,
    pub announce_initial: Option<bool>,
    #[serde(default)]
    pub probe: ProbeSection,
    #[serde(default)]
    pub notify: NotifySection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeSection {
    pub kind: Option<ProbeKind>,
    pub port: Option<u16>,
    pub max_wait: Option<String>,
    pub step: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifySection {
    pub min_spacing: Option<String>,
    pub settle_delay: Option<String>,
    pub syslog_ident: Option<String>,
    pub command: Option<String>,
}

/// Which echo probe the daemon uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// The system `ping` binary.
    #[default]
    Ping,
    /// A TCP connect to `port`.
    Tcp,
}

/// Resolved daemon settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub interval: Duration,
    pub hosts_file: PathBuf,
    /// Notify on the first classification of each host.
    pub announce_initial: bool,
    pub probe: ProbeSettings,
    pub notify: NotifySettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSettings {
    pub kind: ProbeKind,
    pub port: u16,
    /// Total timeout budget per host per round.
    pub max_wait: Duration,
    /// Growth of the per-attempt timeout.
    pub step: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotifySettings {
    /// Minimum time between two dispatches.
    pub min_spacing: Duration,
    /// Pause after each dispatch.
    pub settle_delay: Duration,
    pub syslog_ident: String,
    /// Relay command argv; the message is appended as the last argument.
    pub command: Option<Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            hosts_file: PathBuf::from(DEFAULT_HOSTS_FILE),
            announce_initial: true,
            probe: ProbeSettings::default(),
            notify: NotifySettings::default(),
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            kind: ProbeKind::Ping,
            port: DEFAULT_TCP_PORT,
            max_wait: DEFAULT_MAX_WAIT,
            step: DEFAULT_STEP,
        }
    }
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            min_spacing: DEFAULT_MIN_SPACING,
            settle_delay: DEFAULT_SETTLE_DELAY,
            syslog_ident: DEFAULT_SYSLOG_IDENT.to_string(),
            command: None,
        }
    }
}

impl Settings {
    /// Read and resolve a TOML config file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let file: FileConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        file.resolve()
    }

    /// Reject values the monitor can't run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.probe.max_wait < Duration::from_secs(1) {
            return Err(ConfigError::Invalid {
                field: "probe.max_wait",
                reason: "must be at least 1s".to_string(),
            });
        }
        if self.probe.step.is_zero() {
            return Err(ConfigError::Invalid {
                field: "probe.step",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.probe.kind == ProbeKind::Tcp && self.probe.port == 0 {
            return Err(ConfigError::Invalid {
                field: "probe.port",
                reason: "tcp probe needs a non-zero port".to_string(),
            });
        }
        Ok(())
    }
}

impl FileConfig {
    pub fn resolve(self) -> ConfigResult<Settings> {
        let defaults = Settings::default();

        let command = match self.notify.command {
            Some(line) => Some(parse_command(&line)?),
            None => None,
        };

        let settings = Settings {
            interval: duration_or("interval", self.interval, defaults.interval)?,
            hosts_file: self.hosts_file.unwrap_or(defaults.hosts_file),
            announce_initial: self.announce_initial.unwrap_or(defaults.announce_initial),
            probe: ProbeSettings {
                kind: self.probe.kind.unwrap_or(defaults.probe.kind),
                port: self.probe.port.unwrap_or(defaults.probe.port),
                max_wait: duration_or("probe.max_wait", self.probe.max_wait, defaults.probe.max_wait)?,
                step: duration_or("probe.step", self.probe.step, defaults.probe.step)?,
            },
            notify: NotifySettings {
                min_spacing: duration_or(
                    "notify.min_spacing",
                    self.notify.min_spacing,
                    defaults.notify.min_spacing,
                )?,
                settle_delay: duration_or(
                    "notify.settle_delay",
                    self.notify.settle_delay,
                    defaults.notify.settle_delay,
                )?,
                syslog_ident: self.notify.syslog_ident.unwrap_or(defaults.notify.syslog_ident),
                command,
            },
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// Split a relay command line with shell word rules. No shell is involved
/// when the command runs.
pub fn parse_command(line: &str) -> ConfigResult<Vec<String>> {
    let argv = shell_words::split(line).map_err(|e| ConfigError::Command(e.to_string()))?;
    if argv.is_empty() {
        return Err(ConfigError::Command("empty command".to_string()));
    }
    Ok(argv)
}

fn duration_or(
    field: &'static str,
    value: Option<String>,
    default: Duration,
) -> ConfigResult<Duration> {
    match value {
        None => Ok(default),
        Some(raw) => parse_duration(&raw).ok_or(ConfigError::Duration { field, value: raw }),
    }
}

/// Parse a duration string like "5s", "500ms", "1m" or a bare number of
/// seconds. Returns `None` for malformed or overflowing input.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
