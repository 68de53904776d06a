//! State Store — durable per-service runtime state
//!
//! `DaemonState` maps service name → runtime counters and health. It is
//! persisted after every cycle as a human-inspectable JSON snapshot,
//! written to a temp file in the same directory and renamed into place so
//! a concurrent reader (the `status` command) never observes a partial
//! write. The file is safe to delete: the daemon restarts every service
//! at `Unknown`.

pub mod lockfile;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use lockfile::{LockError, PidLock};

/// Health classification of one monitored service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    /// Not yet evaluated.
    Unknown,
    Healthy,
    Unhealthy,
    /// A recovery attempt is in flight.
    Restarting,
    /// Restart budget exhausted; manual intervention required.
    Failed,
}

impl std::fmt::Display for ServiceHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::Restarting => "restarting",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Runtime counters and health for one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRuntimeState {
    pub health: ServiceHealth,
    /// Recovery attempts within the current restart window.
    pub restart_count: u32,
    /// When the current restart window opened.
    pub window_start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_restart: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_alert: Option<DateTime<Utc>>,
}

impl ServiceRuntimeState {
    /// Fresh state for a service seen for the first time.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            health: ServiceHealth::Unknown,
            restart_count: 0,
            window_start: now,
            last_restart: None,
            last_alert: None,
        }
    }
}

/// Complete daemon state: the unit of persistence.
///
/// BTreeMap keeps the snapshot deterministically ordered for humans and
/// diffs; evaluation order comes from the config, not from this map.
pub type DaemonState = BTreeMap<String, ServiceRuntimeState>;

/// State store errors. Never fatal — the daemon keeps running in memory
/// and retries persistence next cycle.
#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("failed to write {0}: {1}")]
    Write(PathBuf, #[source] std::io::Error),
    #[error("malformed snapshot {0}: {1}")]
    Malformed(PathBuf, #[source] serde_json::Error),
}

/// JSON snapshot store with atomic replace.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot. `Ok(None)` when no file exists yet.
    pub fn load(&self) -> Result<Option<DaemonState>, StateStoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StateStoreError::Read(self.path.clone(), e)),
        };
        let state = serde_json::from_str(&contents)
            .map_err(|e| StateStoreError::Malformed(self.path.clone(), e))?;
        Ok(Some(state))
    }

    /// Load the prior snapshot, falling back to empty state on any failure.
    pub fn load_or_default(&self) -> DaemonState {
        match self.load() {
            Ok(Some(state)) => {
                info!(
                    path = %self.path.display(),
                    services = state.len(),
                    "Restored state snapshot"
                );
                state
            }
            Ok(None) => {
                info!(path = %self.path.display(), "No prior state snapshot, starting fresh");
                DaemonState::new()
            }
            Err(e) => {
                warn!(error = %e, "Could not restore state snapshot, starting fresh");
                DaemonState::new()
            }
        }
    }

    /// Persist the full state atomically: write a temp file in the same
    /// directory, fsync, rename over the target.
    pub fn persist(&self, state: &DaemonState) -> Result<(), StateStoreError> {
        use std::io::Write;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StateStoreError::Write(self.path.clone(), e))?;
            }
        }

        let tmp = self.path.with_extension(format!("tmp.{}", std::process::id()));
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| StateStoreError::Malformed(self.path.clone(), e))?;

        let write_err = |e| StateStoreError::Write(tmp.clone(), e);
        let mut file = std::fs::File::create(&tmp).map_err(write_err)?;
        file.write_all(&json).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        std::fs::rename(&tmp, &self.path)
            .map_err(|e| StateStoreError::Write(self.path.clone(), e))?;

        debug!(path = %self.path.display(), services = state.len(), "Persisted state snapshot");
        Ok(())
    }
}
