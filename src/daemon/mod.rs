//! Scheduler / Lifecycle Manager
//!
//! Owns the periodic check loop and every subsystem it drives: the check
//! executor, restart controller, alert dispatcher, and state store. One
//! cycle per `check_interval`; within a cycle services are evaluated
//! sequentially in configured order with full per-service isolation — a
//! failing check, recovery, or alert never aborts the siblings.
//!
//! Shutdown and reload are cooperative flags consumed at cycle
//! boundaries only. A termination request lets the in-flight cycle finish
//! (every step is individually time-bounded), persists final state, and
//! releases the pid lock via drop.

pub mod control;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::alerts::AlertDispatcher;
use crate::checks::{CheckExecutor, ProbeExecutor};
use crate::command::{CommandRunner, ShellRunner};
use crate::config::DaemonConfig;
use crate::recovery::RestartController;
use crate::state::{DaemonState, ServiceRuntimeState, StateStore};

/// The monitoring engine: configuration plus every owned subsystem.
pub struct Monitor {
    config: DaemonConfig,
    config_path: PathBuf,
    state: DaemonState,
    store: StateStore,
    executor: Arc<dyn CheckExecutor>,
    runner: Arc<dyn CommandRunner>,
    controller: RestartController,
    dispatcher: AlertDispatcher,
    cycles: u64,
}

impl Monitor {
    /// Production wiring: shell runner, live probes, log + webhook sinks.
    pub fn new(config: DaemonConfig, config_path: PathBuf) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(ShellRunner);
        let executor: Arc<dyn CheckExecutor> = Arc::new(ProbeExecutor::new(
            config.check_timeout(),
            Arc::clone(&runner),
        ));
        let dispatcher =
            AlertDispatcher::new(config.alert_cooldown_secs, config.webhook_url.as_deref());
        Self::assemble(config, config_path, executor, runner, dispatcher)
    }

    /// Custom wiring with injected probe executor, command runner, and
    /// sinks; used by tests to script verdicts and recovery outcomes.
    pub fn with_parts(
        config: DaemonConfig,
        config_path: PathBuf,
        executor: Arc<dyn CheckExecutor>,
        runner: Arc<dyn CommandRunner>,
        dispatcher: AlertDispatcher,
    ) -> Self {
        Self::assemble(config, config_path, executor, runner, dispatcher)
    }

    fn assemble(
        config: DaemonConfig,
        config_path: PathBuf,
        executor: Arc<dyn CheckExecutor>,
        runner: Arc<dyn CommandRunner>,
        dispatcher: AlertDispatcher,
    ) -> Self {
        let store = StateStore::new(config.state_file.clone());
        let state = store.load_or_default();
        let controller = RestartController::new(
            config.restart_limit,
            config.restart_window_secs,
            config.restart_settle(),
            config.restart_cmd_timeout(),
        );
        Self {
            config,
            config_path,
            state,
            store,
            executor,
            runner,
            controller,
            dispatcher,
            cycles: 0,
        }
    }

    /// Run the periodic loop until cancelled.
    ///
    /// `reload_pending` is set by the SIGHUP handler and consumed at the
    /// start of the next cycle, never mid-cycle.
    pub async fn run(
        mut self,
        cancel: CancellationToken,
        reload_pending: Arc<AtomicBool>,
    ) -> anyhow::Result<()> {
        info!(
            services = self.config.services.len(),
            interval_secs = self.config.check_interval_secs,
            restart_limit = self.config.restart_limit,
            "Monitor started"
        );

        let mut interval = tokio::time::interval(self.config.check_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if reload_pending.swap(false, Ordering::SeqCst) {
                        if self.apply_reload() {
                            interval = tokio::time::interval(self.config.check_interval());
                            interval.reset();
                        }
                    }
                    self.run_cycle(Utc::now()).await;
                    self.persist();
                }
            }
        }

        info!(cycles = self.cycles, "Shutdown requested, persisting final state");
        self.persist();
        Ok(())
    }

    /// Evaluate every configured service once, in order.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) {
        self.cycles += 1;
        debug!(cycle = self.cycles, "Cycle start");

        for def in &self.config.services {
            let entry = self
                .state
                .entry(def.name.clone())
                .or_insert_with(|| ServiceRuntimeState::new(now));

            let verdict = self.executor.evaluate(def).await;
            let transitions = self
                .controller
                .drive(
                    def,
                    entry,
                    &verdict,
                    self.executor.as_ref(),
                    self.runner.as_ref(),
                    now,
                )
                .await;

            for transition in &transitions {
                self.dispatcher.dispatch(transition, entry, now).await;
            }
        }
    }

    /// Re-read the config at a cycle boundary. On failure the previous
    /// config stays active. Returns true when the config changed.
    pub fn apply_reload(&mut self) -> bool {
        info!(path = %self.config_path.display(), "Reload requested, re-reading configuration");
        let new = match DaemonConfig::load_from_file(&self.config_path) {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "Reload failed, keeping previous configuration");
                return false;
            }
        };
        if new == self.config {
            info!("Configuration unchanged");
            return false;
        }

        // Prune state for services no longer configured.
        let keep: std::collections::HashSet<&str> =
            new.services.iter().map(|s| s.name.as_str()).collect();
        self.state.retain(|name, _| {
            let retained = keep.contains(name.as_str());
            if !retained {
                info!(service = %name, "Service removed from config, pruning its state");
            }
            retained
        });

        // A changed check variant or target makes the service effectively
        // new: reset its counters rather than carry inconsistent history.
        for def in &new.services {
            let changed = self
                .config
                .services
                .iter()
                .find(|old| old.name == def.name)
                .is_some_and(|old| old.check != def.check);
            if changed {
                info!(service = %def.name, check = %def.check, "Check definition changed, resetting state");
                self.state
                    .insert(def.name.clone(), ServiceRuntimeState::new(Utc::now()));
            }
        }

        self.controller = RestartController::new(
            new.restart_limit,
            new.restart_window_secs,
            new.restart_settle(),
            new.restart_cmd_timeout(),
        );
        if new.webhook_url == self.config.webhook_url {
            // Endpoint unchanged: keep the existing sinks (they may have
            // been injected), only the cooldown needs updating.
            self.dispatcher.set_cooldown(new.alert_cooldown_secs);
        } else {
            info!(
                webhook = new.webhook_url.as_deref().unwrap_or("<none>"),
                "Webhook endpoint changed, rebuilding alert sinks"
            );
            self.dispatcher =
                AlertDispatcher::new(new.alert_cooldown_secs, new.webhook_url.as_deref());
        }
        if new.state_file != self.config.state_file {
            self.store = StateStore::new(new.state_file.clone());
        }
        // Note: a changed check_timeout_secs applies to new probe clients
        // on the next daemon start; the executor is not rebuilt here.

        info!(services = new.services.len(), "Configuration reloaded");
        self.config = new;
        true
    }

    /// Best-effort persistence; failures are retried next cycle.
    fn persist(&self) {
        if let Err(e) = self.store.persist(&self.state) {
            warn!(error = %e, "State persistence failed, will retry next cycle");
        }
    }

    /// Read-only view of the in-memory state map.
    pub fn state(&self) -> &DaemonState {
        &self.state
    }
}
