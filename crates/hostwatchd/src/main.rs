//! hostwatchd — the hostwatch daemon.
//!
//! Loads the host list, forks into the background unless told otherwise,
//! then polls every host once per interval and reports up/down transitions
//! to syslog and, if configured, to an external relay command.
//!
//! # Usage
//!
//! ```text
//! hostwatchd -f /etc/hostwatch.hosts -i 60
//! hostwatchd -n -D -c /etc/hostwatch.toml
//! ```
//!
//! Exit status: 0 on SIGINT/SIGTERM, 1 on a configuration or host list
//! error, 2 when the local probing mechanism fails.

mod daemon;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use hostwatch_core::{HostRegistry, Settings};
use hostwatch_health::{AnyProbe, Monitor, MonitorError, RetrySchedule, RetryingProber};
use hostwatch_notify::{CommandSink, Notifier, SyslogSink};

const EXIT_CONFIG: u8 = 1;
const EXIT_TRANSPORT: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "hostwatchd", about = "Host liveness monitor", version)]
struct Cli {
    /// Seconds between polling rounds.
    #[arg(short, long)]
    interval: Option<u64>,

    /// Host list, one name per line.
    #[arg(short = 'f', long)]
    hosts_file: Option<PathBuf>,

    /// Stay in the foreground instead of forking.
    #[arg(short = 'n', long)]
    foreground: bool,

    /// Verbose logging. The relay command is logged, not executed.
    #[arg(short = 'D', long)]
    debug: bool,

    /// Optional TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let settings = match resolve_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let origin = gethostname::gethostname().to_string_lossy().into_owned();
    debug!(hostname = %origin, "local identity");

    // Loaded before forking so a bad path still reaches the terminal.
    let registry = match HostRegistry::load(&settings.hosts_file) {
        Ok(registry) => registry,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if !cli.foreground {
        if let Err(e) = daemon::detach() {
            error!(error = %e, "failed to detach");
            return ExitCode::from(EXIT_CONFIG);
        }
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(settings, registry, origin, cli.debug)) {
        Ok(()) => {
            info!("hostwatch stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            match e.downcast_ref::<MonitorError>() {
                Some(MonitorError::Transport { .. }) => ExitCode::from(EXIT_TRANSPORT),
                None => ExitCode::from(EXIT_CONFIG),
            }
        }
    }
}

fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "info,hostwatchd=debug,hostwatch_core=debug,hostwatch_health=debug,hostwatch_notify=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Config file (or defaults), then command-line overrides.
fn resolve_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };

    if let Some(secs) = cli.interval {
        settings.interval = Duration::from_secs(secs);
    }
    if let Some(path) = &cli.hosts_file {
        settings.hosts_file = path.clone();
    }
    settings.validate()?;
    Ok(settings)
}

fn build_notifier(settings: &Settings, origin: String, dry_run: bool) -> anyhow::Result<Notifier> {
    let syslog = SyslogSink::new(&settings.notify.syslog_ident)
        .with_context(|| format!("invalid syslog ident {:?}", settings.notify.syslog_ident))?;

    let mut notifier = Notifier::new(Box::new(syslog), origin)
        .with_pacing(settings.notify.min_spacing, settings.notify.settle_delay);

    match &settings.notify.command {
        Some(argv) => {
            info!(command = ?argv, dry_run, "relay command configured");
            notifier = notifier.with_relay(Box::new(CommandSink::new(argv.clone()).dry_run(dry_run)));
        }
        None => debug!("no relay command configured"),
    }
    Ok(notifier)
}

async fn serve(
    settings: Settings,
    registry: HostRegistry,
    origin: String,
    debug: bool,
) -> anyhow::Result<()> {
    info!(
        hosts = registry.len(),
        interval_secs = settings.interval.as_secs(),
        probe = ?settings.probe.kind,
        "hostwatch starting"
    );

    let notifier = build_notifier(&settings, origin, debug)?;
    let prober = RetryingProber::new(
        AnyProbe::from_settings(&settings.probe),
        RetrySchedule::from_settings(&settings.probe),
    );
    let mut monitor = Monitor::new(registry, prober, notifier, settings.interval)
        .announce_initial(settings.announce_initial);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    monitor.run(shutdown_rx).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
