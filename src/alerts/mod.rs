//! Alert Dispatcher — cooldown-gated notification delivery
//!
//! Transitions into `Unhealthy`, `Restarting`, or `Failed` raise an
//! `AlertEvent`. A per-service cooldown suppresses repeats; when it has
//! elapsed, the event goes to every configured sink independently. Sink
//! failure is logged and discarded — alert delivery must never block or
//! abort the check cycle.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::recovery::HealthTransition;
use crate::state::{ServiceHealth, ServiceRuntimeState};

/// Alert severity, derived from the target health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// One alert, constructed per transition and delivered immediately.
#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    pub timestamp: DateTime<Utc>,
    pub hostname: String,
    pub service: String,
    pub severity: Severity,
    pub message: String,
    pub restart_count: u32,
}

/// Delivery errors — logged and discarded, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Trait for alert delivery targets, injectable for tests.
#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &'static str;
    async fn deliver(&self, event: &AlertEvent) -> Result<(), AlertError>;
}

/// POSTs the alert as JSON to a configured endpoint.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, event: &AlertEvent) -> Result<(), AlertError> {
        let resp = self.client.post(&self.url).json(event).send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(AlertError::Status(resp.status()))
        }
    }
}

/// Writes the alert to the local log stream.
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, event: &AlertEvent) -> Result<(), AlertError> {
        warn!(
            target: "sentryd::alert",
            service = %event.service,
            severity = %event.severity,
            restart_count = event.restart_count,
            "{}",
            event.message
        );
        Ok(())
    }
}

/// Cooldown gate plus fan-out to sinks.
pub struct AlertDispatcher {
    sinks: Vec<Box<dyn AlertSink>>,
    cooldown: ChronoDuration,
    hostname: String,
}

impl AlertDispatcher {
    /// Production dispatcher: local log always, webhook when configured.
    pub fn new(cooldown_secs: u64, webhook_url: Option<&str>) -> Self {
        let mut sinks: Vec<Box<dyn AlertSink>> = vec![Box::new(LogSink)];
        if let Some(url) = webhook_url {
            sinks.push(Box::new(WebhookSink::new(url)));
        }
        Self::with_sinks(cooldown_secs, sinks)
    }

    pub fn with_sinks(cooldown_secs: u64, sinks: Vec<Box<dyn AlertSink>>) -> Self {
        Self {
            sinks,
            cooldown: ChronoDuration::seconds(cooldown_secs.min(i64::MAX as u64) as i64),
            hostname: hostname(),
        }
    }

    /// Adjust the cooldown (config reload).
    pub fn set_cooldown(&mut self, cooldown_secs: u64) {
        self.cooldown = ChronoDuration::seconds(cooldown_secs.min(i64::MAX as u64) as i64);
    }

    /// Dispatch one transition. Returns true when an alert was delivered
    /// (i.e. the transition alerts and the cooldown had elapsed).
    pub async fn dispatch(
        &self,
        transition: &HealthTransition,
        state: &mut ServiceRuntimeState,
        now: DateTime<Utc>,
    ) -> bool {
        let severity = match transition.to {
            ServiceHealth::Unhealthy | ServiceHealth::Restarting => Severity::Warning,
            ServiceHealth::Failed => Severity::Critical,
            ServiceHealth::Healthy | ServiceHealth::Unknown => return false,
        };

        if let Some(last) = state.last_alert {
            if now - last < self.cooldown {
                debug!(
                    service = %transition.service,
                    to = %transition.to,
                    "Alert suppressed by cooldown"
                );
                return false;
            }
        }

        let event = AlertEvent {
            timestamp: now,
            hostname: self.hostname.clone(),
            service: transition.service.clone(),
            severity,
            message: format!(
                "{}: {} -> {} ({})",
                transition.service, transition.from, transition.to, transition.detail
            ),
            restart_count: state.restart_count,
        };

        // Sinks are independent; one failing never stops the others.
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(&event).await {
                warn!(sink = sink.name(), service = %event.service, error = %e, "Alert delivery failed");
            }
        }

        // Cooldown stamps on attempt, not on sink success — a flapping
        // webhook must not defeat the rate limit.
        state.last_alert = Some(now);
        true
    }
}

/// Best-effort hostname for alert payloads.
fn hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .or_else(|_| std::fs::read_to_string("/etc/hostname"))
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
