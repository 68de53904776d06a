//! sentryd: service health monitoring and recovery
//!
//! A daemon that periodically probes configured services, classifies each
//! as healthy or unhealthy, attempts bounded automatic recovery, and
//! raises rate-limited alerts.
//!
//! ## Architecture
//!
//! - **Check Executor**: per-variant probes (process, port, http, custom)
//! - **Restart Controller**: recovery state machine with a windowed budget
//! - **Alert Dispatcher**: cooldown-gated delivery to independent sinks
//! - **State Store**: crash-safe JSON snapshot of per-service state
//! - **Scheduler**: periodic loop with signal-driven shutdown and reload

pub mod alerts;
pub mod checks;
pub mod command;
pub mod config;
pub mod daemon;
pub mod recovery;
pub mod state;

// Re-export configuration
pub use config::{CheckSpec, ConfigError, DaemonConfig, ServiceDefinition};

// Re-export commonly used types
pub use alerts::{AlertDispatcher, AlertEvent, AlertSink, Severity};
pub use checks::{CheckExecutor, CheckOutcome, ProbeExecutor};
pub use command::{CommandOutcome, CommandRunner, ShellRunner};
pub use daemon::Monitor;
pub use recovery::{HealthTransition, RestartController};
pub use state::{
    DaemonState, LockError, PidLock, ServiceHealth, ServiceRuntimeState, StateStore,
    StateStoreError,
};
