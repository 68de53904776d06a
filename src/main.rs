//! sentryd - Service Health Monitoring and Recovery Daemon
//!
//! Periodically probes configured services, attempts bounded automatic
//! recovery, and raises rate-limited alerts.
//!
//! # Usage
//!
//! ```bash
//! # Run the daemon in the foreground
//! sentryd start
//!
//! # Inspect the running instance and per-service health
//! sentryd status
//!
//! # Re-read sentryd.toml at the next cycle boundary
//! sentryd reload
//!
//! # Graceful shutdown
//! sentryd stop
//! ```
//!
//! # Environment Variables
//!
//! - `SENTRYD_CONFIG`: path to the TOML config (default: ./sentryd.toml)
//! - `RUST_LOG`: logging level (default: info)

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use sentryd::daemon::control;
use sentryd::daemon::control::{EXIT_ERROR, EXIT_NOT_RUNNING, EXIT_OK};
use sentryd::{ConfigError, DaemonConfig, LockError, Monitor, PidLock};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "sentryd")]
#[command(about = "Service health monitoring and recovery daemon")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config file (overrides $SENTRYD_CONFIG)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Start the monitoring loop in the foreground
    Start,
    /// Gracefully stop the running instance
    Stop,
    /// Report liveness and per-service health
    Status,
    /// Stop the running instance (if any), then start
    Restart,
    /// Ask the running instance to re-read its config
    Reload,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let (path, config) = match load_config(args.config.as_deref()) {
        Ok(pair) => pair,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(EXIT_ERROR as u8);
        }
    };

    let code = match args.command {
        Command::Start => run_start(&path, &config).await,
        Command::Stop => control::stop(&config),
        Command::Status => control::status(&config),
        Command::Reload => control::reload(&config),
        Command::Restart => {
            match control::stop(&config) {
                EXIT_NOT_RUNNING => info!("No running instance, starting fresh"),
                EXIT_OK => {}
                other => return ExitCode::from(other as u8),
            }
            run_start(&path, &config).await
        }
    };

    ExitCode::from(code.clamp(0, i32::from(u8::MAX)) as u8)
}

/// Resolve and load the config; every command needs at least the pid and
/// state file locations.
fn load_config(explicit: Option<&std::path::Path>) -> Result<(PathBuf, DaemonConfig), ConfigError> {
    let path = DaemonConfig::resolve_path(explicit)?;
    let config = DaemonConfig::load_from_file(&path)?;
    Ok((path, config))
}

/// Run the daemon: single-instance check, signal wiring, periodic loop.
async fn run_start(path: &std::path::Path, config: &DaemonConfig) -> i32 {
    let lock = match PidLock::acquire(&config.pid_file) {
        Ok(lock) => lock,
        Err(e @ LockError::AlreadyRunning(_)) => {
            error!("{e}");
            return EXIT_ERROR;
        }
        Err(e) => {
            error!("failed to acquire pid lock: {e}");
            return EXIT_ERROR;
        }
    };

    info!("sentryd starting (pid {})", std::process::id());

    let cancel = CancellationToken::new();
    let reload_pending = Arc::new(AtomicBool::new(false));
    spawn_signal_handlers(cancel.clone(), Arc::clone(&reload_pending));

    let monitor = Monitor::new(config.clone(), path.to_path_buf());
    let result = monitor.run(cancel, reload_pending).await;

    drop(lock);
    match result {
        Ok(()) => {
            info!("sentryd shutdown complete");
            EXIT_OK
        }
        Err(e) => {
            error!("monitor failed: {e:#}");
            EXIT_ERROR
        }
    }
}

/// SIGTERM/SIGINT request graceful shutdown; SIGHUP requests a reload
/// consumed at the next cycle boundary.
fn spawn_signal_handlers(cancel: CancellationToken, reload_pending: Arc<AtomicBool>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        tokio::spawn(async move {
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    error!("failed to install SIGTERM handler: {e}");
                    return;
                }
            };
            let mut sighup = match signal(SignalKind::hangup()) {
                Ok(s) => s,
                Err(e) => {
                    error!("failed to install SIGHUP handler: {e}");
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, initiating graceful shutdown");
                        cancel.cancel();
                        return;
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received Ctrl+C, initiating graceful shutdown");
                        cancel.cancel();
                        return;
                    }
                    _ = sighup.recv() => {
                        info!("Received SIGHUP, reload scheduled for next cycle");
                        reload_pending.store(true, Ordering::SeqCst);
                    }
                }
            }
        });
    }

    #[cfg(not(unix))]
    tokio::spawn(async move {
        let _ = reload_pending;
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating graceful shutdown");
        cancel.cancel();
    });
}
