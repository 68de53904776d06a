//! Check Executor — one probe per check variant
//!
//! Every variant implements the same contract: evaluate one service, return
//! a verdict with a human-readable detail string. The executor wraps each
//! probe in an outer timeout and folds every error, timeout, or unexpected
//! failure into an unhealthy verdict — a broken probe must never crash the
//! cycle or abort the sibling services.

pub mod http;
pub mod port;
pub mod process;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::command::CommandRunner;
use crate::config::{CheckSpec, ServiceDefinition};

/// Verdict of one health check.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub healthy: bool,
    pub detail: String,
}

impl CheckOutcome {
    pub fn healthy(detail: impl Into<String>) -> Self {
        Self {
            healthy: true,
            detail: detail.into(),
        }
    }

    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            healthy: false,
            detail: detail.into(),
        }
    }
}

/// Trait for evaluating a service's health.
///
/// The daemon uses [`ProbeExecutor`]; tests inject scripted verdicts.
#[async_trait]
pub trait CheckExecutor: Send + Sync {
    async fn evaluate(&self, def: &ServiceDefinition) -> CheckOutcome;
}

/// Production executor dispatching on the configured check variant.
pub struct ProbeExecutor {
    client: reqwest::Client,
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl ProbeExecutor {
    /// Build an executor with the given per-probe timeout.
    ///
    /// Falls back to a default reqwest client if the builder fails (it only
    /// does when TLS backends are misconfigured at build time).
    pub fn new(timeout: Duration, runner: Arc<dyn CommandRunner>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            runner,
            timeout,
        }
    }

    async fn probe(&self, spec: &CheckSpec) -> CheckOutcome {
        match spec {
            CheckSpec::Process { process } => process::probe(process),
            CheckSpec::Port { host, port } => port::probe(host, *port, self.timeout).await,
            CheckSpec::Http { url, expect_status } => {
                http::probe(&self.client, url, *expect_status).await
            }
            CheckSpec::Custom { command } => {
                let outcome = self.runner.run(command, self.timeout).await;
                if outcome.success {
                    CheckOutcome::healthy(format!(
                        "command exited 0 in {}ms",
                        outcome.elapsed.as_millis()
                    ))
                } else {
                    CheckOutcome::unhealthy(format!("command failed: {}", outcome.output))
                }
            }
        }
    }
}

#[async_trait]
impl CheckExecutor for ProbeExecutor {
    async fn evaluate(&self, def: &ServiceDefinition) -> CheckOutcome {
        match tokio::time::timeout(self.timeout, self.probe(&def.check)).await {
            Ok(outcome) => outcome,
            Err(_) => CheckOutcome::unhealthy(format!(
                "check timed out after {}s",
                self.timeout.as_secs()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ShellRunner;

    fn executor() -> ProbeExecutor {
        ProbeExecutor::new(Duration::from_secs(2), Arc::new(ShellRunner))
    }

    fn custom_service(command: &str) -> ServiceDefinition {
        ServiceDefinition {
            name: "svc".to_string(),
            check: CheckSpec::Custom {
                command: command.to_string(),
            },
            restart_cmd: None,
        }
    }

    #[tokio::test]
    async fn custom_check_exit_zero_is_healthy() {
        let outcome = executor().evaluate(&custom_service("true")).await;
        assert!(outcome.healthy);
    }

    #[tokio::test]
    async fn custom_check_nonzero_is_unhealthy() {
        let outcome = executor().evaluate(&custom_service("exit 3")).await;
        assert!(!outcome.healthy);
    }

    #[tokio::test]
    async fn slow_probe_times_out_as_unhealthy() {
        let outcome = executor().evaluate(&custom_service("sleep 10")).await;
        assert!(!outcome.healthy);
        assert!(outcome.detail.contains("timed out") || outcome.detail.contains("failed"));
    }
}
