//! Client-side lifecycle commands: stop, status, reload.
//!
//! These run in a *separate* process from the daemon. They find the live
//! instance through the pid lockfile and talk to it with Unix signals:
//! SIGTERM for graceful shutdown, SIGHUP for reload-at-next-cycle. The
//! health summary comes from the persisted snapshot, so repeated `status`
//! calls between cycles report identical output.

use std::time::{Duration, Instant};

use tracing::info;

use crate::config::DaemonConfig;
use crate::state::{lockfile, DaemonState, PidLock, ServiceHealth, StateStore};

/// Exit code: success.
pub const EXIT_OK: i32 = 0;
/// Exit code: generic error (already running, unhealthy services, ...).
pub const EXIT_ERROR: i32 = 1;
/// Exit code: no daemon instance is running.
pub const EXIT_NOT_RUNNING: i32 = 3;

/// How long `stop` waits for the daemon to exit gracefully.
const STOP_WAIT: Duration = Duration::from_secs(30);

/// Send SIGTERM to the live instance and wait for it to exit.
pub fn stop(config: &DaemonConfig) -> i32 {
    let Some(pid) = PidLock::live_holder(&config.pid_file) else {
        eprintln!("sentryd is not running");
        return EXIT_NOT_RUNNING;
    };

    info!(pid, "Sending SIGTERM");
    if !send_signal(pid, libc::SIGTERM) {
        eprintln!("failed to signal pid {pid}");
        return EXIT_ERROR;
    }

    let deadline = Instant::now() + STOP_WAIT;
    while Instant::now() < deadline {
        if !lockfile::is_process_alive(pid) {
            println!("sentryd (pid {pid}) stopped");
            return EXIT_OK;
        }
        std::thread::sleep(Duration::from_millis(200));
    }

    eprintln!("sentryd (pid {pid}) did not exit within {}s", STOP_WAIT.as_secs());
    EXIT_ERROR
}

/// Report liveness and the per-service health summary.
///
/// Exit 0 iff an instance is running and every service is healthy.
pub fn status(config: &DaemonConfig) -> i32 {
    let Some(pid) = PidLock::live_holder(&config.pid_file) else {
        println!("sentryd is not running");
        return EXIT_NOT_RUNNING;
    };
    println!("sentryd is running (pid {pid})");

    let state = StateStore::new(config.state_file.clone()).load_or_default();
    if state.is_empty() {
        println!("no service state recorded yet");
        return EXIT_ERROR;
    }

    println!();
    let (table, all_healthy) = render_status(&state, config.restart_limit);
    print!("{table}");

    if all_healthy {
        EXIT_OK
    } else {
        EXIT_ERROR
    }
}

/// Render the per-service summary table from one snapshot.
///
/// Pure over its inputs: between cycles the snapshot does not change, so
/// repeated `status` calls print identical output. Also reports whether
/// every service is healthy (the exit-code decision).
fn render_status(state: &DaemonState, restart_limit: u32) -> (String, bool) {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<20} {:<12} {:<10} {:<22} {}",
        "SERVICE", "HEALTH", "RESTARTS", "LAST RESTART", "LAST ALERT"
    );
    let mut all_healthy = true;
    for (name, runtime) in state {
        if runtime.health != ServiceHealth::Healthy {
            all_healthy = false;
        }
        let _ = writeln!(
            out,
            "{:<20} {:<12} {:<10} {:<22} {}",
            name,
            runtime.health.to_string(),
            format!("{}/{}", runtime.restart_count, restart_limit),
            runtime
                .last_restart
                .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            runtime
                .last_alert
                .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
        );
    }
    (out, all_healthy)
}

/// Ask the live instance to re-read its config at the next cycle boundary.
pub fn reload(config: &DaemonConfig) -> i32 {
    let Some(pid) = PidLock::live_holder(&config.pid_file) else {
        eprintln!("sentryd is not running");
        return EXIT_NOT_RUNNING;
    };

    if send_signal(pid, libc::SIGHUP) {
        println!("reload requested (pid {pid}); applied at the next cycle boundary");
        EXIT_OK
    } else {
        eprintln!("failed to signal pid {pid}");
        EXIT_ERROR
    }
}

/// Deliver a signal; false when the process is gone or not ours to signal.
fn send_signal(pid: u32, signal: i32) -> bool {
    // Safety: kill(2) with a valid signal number; no memory is touched.
    unsafe { libc::kill(pid as libc::pid_t, signal) == 0 }
}
