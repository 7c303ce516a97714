//! Write-only notification sinks.
//!
//! Sinks never block the monitor for long: the syslog call is a local
//! socket write, and the relay command is spawned and reaped in the
//! background.

use std::process::Stdio;

use thiserror::Error;
use tracing::{debug, warn};

/// Errors from a single dispatch. Never fatal to the monitor.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("message contains a NUL byte")]
    Nul,

    #[error("relay command is empty")]
    EmptyCommand,

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// A destination for formatted notification lines.
pub trait NotifySink: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &str;

    fn dispatch(&self, line: &str) -> Result<(), SinkError>;
}

/// Writes lines to the system log at `LOG_NOTICE`, facility `LOG_USER`.
#[cfg(unix)]
pub struct SyslogSink {
    ident: std::ffi::CString,
}

#[cfg(unix)]
impl SyslogSink {
    pub fn new(ident: &str) -> Result<Self, SinkError> {
        let ident = std::ffi::CString::new(ident).map_err(|_| SinkError::Nul)?;
        Ok(Self { ident })
    }
}

#[cfg(unix)]
impl NotifySink for SyslogSink {
    fn name(&self) -> &str {
        "syslog"
    }

    fn dispatch(&self, line: &str) -> Result<(), SinkError> {
        let msg = std::ffi::CString::new(line).map_err(|_| SinkError::Nul)?;
        // SAFETY: `ident` outlives the openlog/closelog window and the
        // format string is a literal with a single `%s` for `msg`.
        unsafe {
            libc::openlog(self.ident.as_ptr(), libc::LOG_PID, libc::LOG_USER);
            libc::syslog(libc::LOG_NOTICE, c"%s".as_ptr(), msg.as_ptr());
            libc::closelog();
        }
        Ok(())
    }
}

/// Runs an external relay command with the line as its last argument.
///
/// The command is executed directly, not through a shell. The child is
/// reaped by a background task; its exit status is only logged.
pub struct CommandSink {
    argv: Vec<String>,
    dry_run: bool,
}

impl CommandSink {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            dry_run: false,
        }
    }

    /// Log the command instead of running it.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl NotifySink for CommandSink {
    fn name(&self) -> &str {
        "relay"
    }

    fn dispatch(&self, line: &str) -> Result<(), SinkError> {
        let (program, args) = self.argv.split_first().ok_or(SinkError::EmptyCommand)?;

        if self.dry_run {
            debug!(%program, ?args, %line, "relay command (dry run)");
            return Ok(());
        }

        let mut child = tokio::process::Command::new(program)
            .args(args)
            .arg(line)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SinkError::Spawn {
                program: program.clone(),
                source,
            })?;

        let program = program.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => debug!(%program, "relay command finished"),
                Ok(status) => warn!(%program, %status, "relay command failed"),
                Err(e) => warn!(%program, error = %e, "relay command wait failed"),
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn command_sink_passes_line_as_last_argument() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("relay.out");
        let script = format!("printf '%s' \"$1\" > {}", out.display());

        let sink = CommandSink::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            script,
            "relay".to_string(),
        ]);
        sink.dispatch("gw01: 03070905 Host db down.").unwrap();

        let mut written = String::new();
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            written = std::fs::read_to_string(&out).unwrap_or_default();
            if !written.is_empty() {
                break;
            }
        }
        assert_eq!(written, "gw01: 03070905 Host db down.");
    }

    #[tokio::test]
    async fn command_sink_missing_program() {
        let sink = CommandSink::new(vec!["/nonexistent/hostwatch-relay".to_string()]);
        let err = sink.dispatch("Host db down.").unwrap_err();
        assert!(matches!(err, SinkError::Spawn { .. }));
    }

    #[tokio::test]
    async fn command_sink_dry_run_does_not_spawn() {
        let sink = CommandSink::new(vec!["/nonexistent/hostwatch-relay".to_string()]).dry_run(true);
        assert!(sink.dispatch("Host db down.").is_ok());
    }

    #[test]
    fn empty_command() {
        let sink = CommandSink::new(Vec::new());
        assert!(matches!(sink.dispatch("x"), Err(SinkError::EmptyCommand)));
    }

    #[cfg(unix)]
    #[test]
    fn syslog_rejects_nul() {
        let sink = SyslogSink::new("hostwatch-test").unwrap();
        assert!(matches!(sink.dispatch("bad\0line"), Err(SinkError::Nul)));
        assert!(SyslogSink::new("bad\0ident").is_err());
    }
}
