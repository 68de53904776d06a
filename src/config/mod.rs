//! Daemon Configuration Module
//!
//! Loads the monitored-service list and daemon-wide options from a TOML
//! file. Loading is two-pass: the raw TOML is first checked for unknown
//! keys (warnings with "did you mean?" suggestions), then deserialized
//! into permissive raw structs and validated. Validation collects *every*
//! problem before failing, so an operator fixes the whole file in one
//! round trip instead of one error at a time.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` CLI flag
//! 2. `SENTRYD_CONFIG` environment variable
//! 3. `sentryd.toml` in the current working directory

pub mod validation;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

/// Environment variable that points at the config file.
pub const CONFIG_ENV_VAR: &str = "SENTRYD_CONFIG";

/// Config file looked up in the working directory when nothing else is set.
pub const DEFAULT_CONFIG_FILE: &str = "sentryd.toml";

/// Configuration errors. All variants are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no config file found (tried --config, ${CONFIG_ENV_VAR}, ./{DEFAULT_CONFIG_FILE})")]
    NotFound,
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("invalid configuration ({count} problem{plural}):\n{list}",
        count = .0.len(),
        plural = if .0.len() == 1 { "" } else { "s" },
        list = .0.iter().map(|p| format!("  - {p}")).collect::<Vec<_>>().join("\n"))]
    Invalid(Vec<String>),
}

// ============================================================================
// Service Definitions
// ============================================================================

/// How a single service's health is probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckSpec {
    /// Healthy iff at least one running process matches the name.
    Process { process: String },
    /// Healthy iff a TCP connection to host:port succeeds.
    Port { host: String, port: u16 },
    /// Healthy iff GET returns the expected status code.
    Http { url: String, expect_status: u16 },
    /// Healthy iff the command exits 0.
    Custom { command: String },
}

impl CheckSpec {
    /// Short variant name for logs and status output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Process { .. } => "process",
            Self::Port { .. } => "port",
            Self::Http { .. } => "http",
            Self::Custom { .. } => "custom",
        }
    }
}

impl fmt::Display for CheckSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Process { process } => write!(f, "process:{process}"),
            Self::Port { host, port } => write!(f, "port:{host}:{port}"),
            Self::Http { url, expect_status } => write!(f, "http:{url}={expect_status}"),
            Self::Custom { command } => write!(f, "custom:{command}"),
        }
    }
}

/// One monitored service: unique name, probe, optional recovery command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub name: String,
    pub check: CheckSpec,
    /// External recovery action, run through the command runner when the
    /// restart controller decides to attempt recovery. Services without one
    /// are monitored and alerted on, but never restarted.
    pub restart_cmd: Option<String>,
}

// ============================================================================
// Daemon Configuration
// ============================================================================

/// Complete validated daemon configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    /// Seconds between check cycles.
    pub check_interval_secs: u64,
    /// Maximum recovery attempts per service within one restart window.
    pub restart_limit: u32,
    /// Sliding window (seconds) over which restart attempts are counted.
    pub restart_window_secs: u64,
    /// Minimum seconds between two alerts for the same service.
    pub alert_cooldown_secs: u64,
    /// Per-probe timeout (seconds).
    pub check_timeout_secs: u64,
    /// Seconds to wait after a recovery action before re-checking.
    pub restart_settle_secs: u64,
    /// Timeout (seconds) for the recovery command itself.
    pub restart_cmd_timeout_secs: u64,
    /// Optional webhook endpoint for alert delivery.
    pub webhook_url: Option<String>,
    /// Where the per-service runtime state snapshot is persisted.
    pub state_file: PathBuf,
    /// Pid lockfile enforcing the single-instance invariant.
    pub pid_file: PathBuf,
    /// Monitored services, evaluated in this order every cycle.
    pub services: Vec<ServiceDefinition>,
}

impl DaemonConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    pub fn restart_settle(&self) -> Duration {
        Duration::from_secs(self.restart_settle_secs)
    }

    pub fn restart_cmd_timeout(&self) -> Duration {
        Duration::from_secs(self.restart_cmd_timeout_secs)
    }

    /// Resolve the config path: explicit flag, then env var, then ./sentryd.toml.
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
        if let Some(p) = explicit {
            return Ok(p.to_path_buf());
        }
        if let Ok(p) = std::env::var(CONFIG_ENV_VAR) {
            if !p.is_empty() {
                return Ok(PathBuf::from(p));
            }
        }
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Ok(local);
        }
        Err(ConfigError::NotFound)
    }

    /// Load and validate from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        // Pass 1: unknown-key warnings. Never fatal — typos in option names
        // surface here, typos in required fields fail validation below.
        for w in validation::validate_unknown_keys(&contents) {
            warn!(path = %path.display(), "{w}");
        }

        // Pass 2: permissive parse, then full validation.
        let raw: RawConfig = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        let config = raw.validate()?;

        info!(
            path = %path.display(),
            services = config.services.len(),
            interval_secs = config.check_interval_secs,
            "Loaded configuration"
        );
        Ok(config)
    }
}

// ============================================================================
// Raw (permissive) structs
// ============================================================================

/// Raw TOML shape. Every service field is optional so that validation can
/// enumerate all missing/unknown pieces instead of stopping at serde's
/// first error.
#[derive(Debug, Deserialize)]
struct RawConfig {
    check_interval_secs: Option<u64>,
    restart_limit: Option<u32>,
    restart_window_secs: Option<u64>,
    alert_cooldown_secs: Option<u64>,
    check_timeout_secs: Option<u64>,
    restart_settle_secs: Option<u64>,
    restart_cmd_timeout_secs: Option<u64>,
    webhook_url: Option<String>,
    state_file: Option<PathBuf>,
    pid_file: Option<PathBuf>,
    #[serde(default)]
    service: Vec<RawService>,
}

#[derive(Debug, Deserialize)]
struct RawService {
    name: Option<String>,
    check: Option<String>,
    process: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    url: Option<String>,
    expect_status: Option<u16>,
    command: Option<String>,
    restart_cmd: Option<String>,
}

impl RawService {
    /// Validate one service entry, pushing every problem found.
    fn validate(&self, index: usize, problems: &mut Vec<String>) -> Option<ServiceDefinition> {
        let label = self
            .name
            .as_deref()
            .map_or_else(|| format!("service #{}", index + 1), |n| format!("service '{n}'"));

        let name = match self.name.as_deref() {
            Some(n) if !n.trim().is_empty() => n.to_string(),
            _ => {
                problems.push(format!("{label}: missing required field 'name'"));
                return None;
            }
        };

        let check = match self.check.as_deref() {
            Some("process") => self.process.as_ref().map_or_else(
                || {
                    problems.push(format!("{label}: check 'process' requires field 'process'"));
                    None
                },
                |p| Some(CheckSpec::Process { process: p.clone() }),
            ),
            Some("port") => match (&self.host, self.port) {
                (Some(host), Some(port)) => Some(CheckSpec::Port { host: host.clone(), port }),
                (host, port) => {
                    if host.is_none() {
                        problems.push(format!("{label}: check 'port' requires field 'host'"));
                    }
                    if port.is_none() {
                        problems.push(format!("{label}: check 'port' requires field 'port'"));
                    }
                    None
                }
            },
            Some("http") => self.url.as_ref().map_or_else(
                || {
                    problems.push(format!("{label}: check 'http' requires field 'url'"));
                    None
                },
                |url| {
                    Some(CheckSpec::Http {
                        url: url.clone(),
                        expect_status: self.expect_status.unwrap_or(200),
                    })
                },
            ),
            Some("custom") => self.command.as_ref().map_or_else(
                || {
                    problems.push(format!("{label}: check 'custom' requires field 'command'"));
                    None
                },
                |c| Some(CheckSpec::Custom { command: c.clone() }),
            ),
            Some(other) => {
                problems.push(format!(
                    "{label}: unknown check variant '{other}' (expected process, port, http, or custom)"
                ));
                None
            }
            None => {
                problems.push(format!("{label}: missing required field 'check'"));
                None
            }
        }?;

        Some(ServiceDefinition {
            name,
            check,
            restart_cmd: self.restart_cmd.clone(),
        })
    }
}

impl RawConfig {
    fn validate(self) -> Result<DaemonConfig, ConfigError> {
        let mut problems = Vec::new();

        let check_interval_secs = self.check_interval_secs.unwrap_or(30);
        if check_interval_secs == 0 {
            problems.push("check_interval_secs must be > 0".to_string());
        }
        let restart_limit = self.restart_limit.unwrap_or(3);
        if restart_limit == 0 {
            problems.push("restart_limit must be > 0".to_string());
        }
        let restart_window_secs = self.restart_window_secs.unwrap_or(300);
        if restart_window_secs == 0 {
            problems.push("restart_window_secs must be > 0".to_string());
        }
        let check_timeout_secs = self.check_timeout_secs.unwrap_or(5);
        if check_timeout_secs == 0 {
            problems.push("check_timeout_secs must be > 0".to_string());
        }

        let mut services = Vec::with_capacity(self.service.len());
        for (i, raw) in self.service.iter().enumerate() {
            if let Some(def) = raw.validate(i, &mut problems) {
                services.push(def);
            }
        }

        if self.service.is_empty() {
            problems.push("no [[service]] entries defined".to_string());
        }

        // Duplicate names break the state map keying.
        let mut seen = std::collections::HashSet::new();
        for def in &services {
            if !seen.insert(def.name.as_str()) {
                problems.push(format!("duplicate service name '{}'", def.name));
            }
        }

        if !problems.is_empty() {
            return Err(ConfigError::Invalid(problems));
        }

        Ok(DaemonConfig {
            check_interval_secs,
            restart_limit,
            restart_window_secs,
            alert_cooldown_secs: self.alert_cooldown_secs.unwrap_or(600),
            check_timeout_secs,
            restart_settle_secs: self.restart_settle_secs.unwrap_or(3),
            restart_cmd_timeout_secs: self.restart_cmd_timeout_secs.unwrap_or(30),
            webhook_url: self.webhook_url,
            state_file: self
                .state_file
                .unwrap_or_else(|| PathBuf::from("./data/sentryd-state.json")),
            pid_file: self
                .pid_file
                .unwrap_or_else(|| PathBuf::from("./data/sentryd.pid")),
            services,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load_str(toml_str: &str) -> Result<DaemonConfig, ConfigError> {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(toml_str.as_bytes()).unwrap();
        DaemonConfig::load_from_file(f.path())
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = load_str(
            r#"
[[service]]
name = "web"
check = "port"
host = "127.0.0.1"
port = 8080
"#,
        )
        .unwrap();
        assert_eq!(config.check_interval_secs, 30);
        assert_eq!(config.restart_limit, 3);
        assert_eq!(config.restart_window_secs, 300);
        assert_eq!(config.alert_cooldown_secs, 600);
        assert_eq!(config.check_timeout_secs, 5);
        assert_eq!(config.services.len(), 1);
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn http_default_expect_status_is_200() {
        let config = load_str(
            r#"
[[service]]
name = "app"
check = "http"
url = "http://localhost:9000/health"
"#,
        )
        .unwrap();
        assert_eq!(
            config.services[0].check,
            CheckSpec::Http {
                url: "http://localhost:9000/health".to_string(),
                expect_status: 200
            }
        );
    }

    #[test]
    fn every_problem_is_enumerated() {
        let err = load_str(
            r#"
check_interval_secs = 0

[[service]]
name = "a"
check = "teapot"

[[service]]
check = "port"
host = "localhost"

[[service]]
name = "c"
check = "port"
host = "localhost"
"#,
        )
        .unwrap_err();
        let ConfigError::Invalid(problems) = err else {
            panic!("expected Invalid, got {err}");
        };
        // zero interval + unknown variant + missing name + missing port
        assert_eq!(problems.len(), 4, "problems: {problems:?}");
        assert!(problems.iter().any(|p| p.contains("check_interval_secs")));
        assert!(problems.iter().any(|p| p.contains("teapot")));
        assert!(problems.iter().any(|p| p.contains("'name'")));
        assert!(problems.iter().any(|p| p.contains("'port'")));
    }

    #[test]
    fn duplicate_service_names_rejected() {
        let err = load_str(
            r#"
[[service]]
name = "web"
check = "process"
process = "nginx"

[[service]]
name = "web"
check = "port"
host = "localhost"
port = 80
"#,
        )
        .unwrap_err();
        let ConfigError::Invalid(problems) = err else {
            panic!("expected Invalid");
        };
        assert!(problems.iter().any(|p| p.contains("duplicate")));
    }

    #[test]
    fn empty_service_list_rejected() {
        let err = load_str("check_interval_secs = 10\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
