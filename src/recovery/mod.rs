//! Restart Controller — recovery state machine with a windowed budget
//!
//! Decides whether and how to recover an unhealthy service. The budget is
//! the system's central backpressure against restart storms: at most
//! `restart_limit` recovery attempts per service within one sliding
//! `restart_window`, after which the service parks in `Failed` until the
//! window elapses. The counter and window start always reset together.
//!
//! Transitions:
//! - healthy verdict → `Healthy` from any state
//! - `Healthy`/`Unknown` + failed check → `Unhealthy`
//! - `Unhealthy` with budget left → `Restarting`: run the recovery action,
//!   wait the settle interval, re-check
//! - re-check pass → `Healthy`; fail with budget left → `Unhealthy`;
//!   counter at limit → `Failed`
//! - `Failed` + failed check → stays `Failed` until the window elapses

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{error, info, warn};

use crate::checks::{CheckExecutor, CheckOutcome};
use crate::command::CommandRunner;
use crate::config::ServiceDefinition;
use crate::state::{ServiceHealth, ServiceRuntimeState};

/// One observed health transition, forwarded to the alert dispatcher.
#[derive(Debug, Clone)]
pub struct HealthTransition {
    pub service: String,
    pub from: ServiceHealth,
    pub to: ServiceHealth,
    pub detail: String,
}

/// The restart-budget policy and recovery timing knobs.
#[derive(Debug, Clone)]
pub struct RestartController {
    limit: u32,
    window: ChronoDuration,
    settle: std::time::Duration,
    cmd_timeout: std::time::Duration,
}

impl RestartController {
    pub fn new(
        limit: u32,
        window_secs: u64,
        settle: std::time::Duration,
        cmd_timeout: std::time::Duration,
    ) -> Self {
        Self {
            limit,
            window: ChronoDuration::seconds(window_secs.min(i64::MAX as u64) as i64),
            settle,
            cmd_timeout,
        }
    }

    /// Feed one check verdict through the state machine, possibly running
    /// a recovery attempt plus re-check. Returns every transition taken
    /// this cycle, in order.
    pub async fn drive(
        &self,
        def: &ServiceDefinition,
        state: &mut ServiceRuntimeState,
        verdict: &CheckOutcome,
        executor: &dyn CheckExecutor,
        runner: &dyn CommandRunner,
        now: DateTime<Utc>,
    ) -> Vec<HealthTransition> {
        let mut transitions = Vec::new();

        if verdict.healthy {
            if state.health != ServiceHealth::Healthy {
                if state.health != ServiceHealth::Unknown {
                    info!(service = %def.name, from = %state.health, "Service recovered");
                }
                Self::shift(def, state, ServiceHealth::Healthy, &verdict.detail, &mut transitions);
            }
            return transitions;
        }

        // Failed verdict.
        match state.health {
            ServiceHealth::Healthy | ServiceHealth::Unknown | ServiceHealth::Restarting => {
                warn!(service = %def.name, detail = %verdict.detail, "Service unhealthy");
                Self::shift(def, state, ServiceHealth::Unhealthy, &verdict.detail, &mut transitions);
            }
            ServiceHealth::Unhealthy => {}
            ServiceHealth::Failed => {
                if now - state.window_start < self.window {
                    // Budget exhausted and window still open: no recovery.
                    return transitions;
                }
                info!(service = %def.name, "Restart window elapsed, re-arming recovery");
                Self::shift(def, state, ServiceHealth::Unhealthy, &verdict.detail, &mut transitions);
            }
        }

        // Window reset: counter and window_start move together.
        if now - state.window_start >= self.window {
            state.restart_count = 0;
            state.window_start = now;
        }

        let Some(restart_cmd) = def.restart_cmd.as_deref() else {
            // No recovery action configured; the service stays unhealthy
            // and is re-evaluated next cycle.
            return transitions;
        };

        if state.restart_count >= self.limit {
            Self::shift(
                def,
                state,
                ServiceHealth::Failed,
                &format!(
                    "restart budget exhausted ({}/{} within window)",
                    state.restart_count, self.limit
                ),
                &mut transitions,
            );
            return transitions;
        }

        // Attempt recovery.
        state.restart_count += 1;
        state.last_restart = Some(now);
        Self::shift(
            def,
            state,
            ServiceHealth::Restarting,
            &format!("recovery attempt {}/{}", state.restart_count, self.limit),
            &mut transitions,
        );

        let outcome = runner.run(restart_cmd, self.cmd_timeout).await;
        if outcome.success {
            info!(
                service = %def.name,
                attempt = state.restart_count,
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "Recovery action completed"
            );
        } else {
            // Counted against the budget either way.
            error!(
                service = %def.name,
                attempt = state.restart_count,
                output = %outcome.output,
                "Recovery action failed"
            );
        }

        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }

        let recheck = executor.evaluate(def).await;
        if recheck.healthy {
            info!(service = %def.name, attempt = state.restart_count, "Service healthy after recovery");
            Self::shift(def, state, ServiceHealth::Healthy, &recheck.detail, &mut transitions);
        } else if state.restart_count >= self.limit {
            error!(
                service = %def.name,
                attempts = state.restart_count,
                "Restart budget exhausted, giving up until window elapses"
            );
            Self::shift(
                def,
                state,
                ServiceHealth::Failed,
                &format!(
                    "still unhealthy after {} attempt(s): {}",
                    state.restart_count, recheck.detail
                ),
                &mut transitions,
            );
        } else {
            Self::shift(def, state, ServiceHealth::Unhealthy, &recheck.detail, &mut transitions);
        }

        transitions
    }

    fn shift(
        def: &ServiceDefinition,
        state: &mut ServiceRuntimeState,
        to: ServiceHealth,
        detail: &str,
        transitions: &mut Vec<HealthTransition>,
    ) {
        if state.health == to {
            return;
        }
        transitions.push(HealthTransition {
            service: def.name.clone(),
            from: state.health,
            to,
            detail: detail.to_string(),
        });
        state.health = to;
    }
}
