//! Pid Lockfile Module
//!
//! Enforces the single-instance invariant: exactly one daemon process may
//! monitor a given state file at a time. The lockfile holds the live
//! daemon's pid; `stop`, `status`, and `reload` read it to find their
//! signal target. A lock is stale iff the recorded pid is no longer
//! alive, in which case `acquire` clears it and proceeds.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

/// Lifecycle errors surfaced through CLI exit codes.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("another instance is already running (pid {0})")]
    AlreadyRunning(u32),
    #[error("lockfile {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
}

/// Advisory pid lock, released on drop.
#[derive(Debug)]
pub struct PidLock {
    path: PathBuf,
    owned: bool,
}

impl PidLock {
    /// Acquire the lock, writing our pid.
    ///
    /// Fails with [`LockError::AlreadyRunning`] when a live process holds
    /// the lock; silently replaces a stale lockfile.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| LockError::Io(path.to_path_buf(), e))?;
            }
        }

        if path.exists() {
            match read_pid(path) {
                Some(pid) if is_process_alive(pid) => {
                    return Err(LockError::AlreadyRunning(pid));
                }
                Some(pid) => {
                    info!(pid, "Removing stale lockfile from previous instance");
                    fs::remove_file(path).map_err(|e| LockError::Io(path.to_path_buf(), e))?;
                }
                None => {
                    warn!(path = %path.display(), "Unreadable lockfile, replacing");
                    let _ = fs::remove_file(path);
                }
            }
        }

        let pid = std::process::id();
        let mut file =
            fs::File::create(path).map_err(|e| LockError::Io(path.to_path_buf(), e))?;
        writeln!(file, "{pid}").map_err(|e| LockError::Io(path.to_path_buf(), e))?;

        debug!(pid, path = %path.display(), "Acquired pid lock");
        Ok(Self {
            path: path.to_path_buf(),
            owned: true,
        })
    }

    /// Pid of the live instance holding the lock at `path`, if any.
    pub fn live_holder(path: &Path) -> Option<u32> {
        read_pid(path).filter(|&pid| is_process_alive(pid))
    }

    /// Release the lock (also called on drop).
    pub fn release(&mut self) {
        if self.owned {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(error = %e, "Failed to remove lockfile");
            } else {
                debug!(path = %self.path.display(), "Released pid lock");
            }
            self.owned = false;
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Parse the recorded pid, `None` on any read or parse failure.
fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// A pid is alive when its `/proc` cmdline is readable and names this
/// program. The name check guards against pid reuse by an unrelated
/// process after a crash.
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    match fs::read_to_string(format!("/proc/{pid}/cmdline")) {
        Ok(cmdline) => cmdline.contains(env!("CARGO_PKG_NAME")),
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn is_process_alive(_pid: u32) -> bool {
    // Conservative: without /proc we cannot prove staleness.
    true
}
