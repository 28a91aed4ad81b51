//! Handle to a running runtime.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::application::scheduler::TickReport;
use crate::domain::{LifecycleState, StreamHealth};
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::health::{runtime_health, HealthReport};

/// Owned by whoever started the runtime; dropping it cancels the runtime.
pub struct RuntimeHandle {
    config: Arc<Config>,
    state: watch::Sender<LifecycleState>,
    health: watch::Receiver<StreamHealth>,
    shutdown: CancellationToken,
    scheduler: Option<JoinHandle<()>>,
    monitor: Option<JoinHandle<()>>,
    reports: Option<broadcast::Receiver<TickReport>>,
}

impl RuntimeHandle {
    pub(super) fn new(
        config: Arc<Config>,
        state: watch::Sender<LifecycleState>,
        health: watch::Receiver<StreamHealth>,
        shutdown: CancellationToken,
        scheduler: JoinHandle<()>,
        monitor: JoinHandle<()>,
        reports: broadcast::Receiver<TickReport>,
    ) -> Self {
        Self {
            config,
            state,
            health,
            shutdown,
            scheduler: Some(scheduler),
            monitor: Some(monitor),
            reports: Some(reports),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Current stream health. `Degraded` does not change [`state`](Self::state).
    #[must_use]
    pub fn health(&self) -> StreamHealth {
        *self.health.borrow()
    }

    pub fn subscribe_health(&self) -> watch::Receiver<StreamHealth> {
        self.health.clone()
    }

    /// Static configuration checks plus the live stream session.
    #[must_use]
    pub fn health_report(&self) -> HealthReport {
        runtime_health(&self.config, self.health())
    }

    /// Tick reports from the first tick on. Available once.
    pub fn take_tick_reports(&mut self) -> Option<broadcast::Receiver<TickReport>> {
        self.reports.take()
    }

    /// Resolve once the scheduler has exited, which only happens after a
    /// stop or a crash of its task.
    pub async fn stopped(&mut self) {
        if let Some(task) = self.scheduler.as_mut() {
            if let Err(err) = task.await {
                error!(error = %err, "Scheduler task ended abnormally");
            }
            self.scheduler = None;
        }
    }

    /// Stop ticking, let the in-flight run finish within the grace period,
    /// then close the stream session.
    pub async fn stop(mut self) {
        self.state.send_replace(LifecycleState::ShuttingDown);
        info!(
            state = %LifecycleState::ShuttingDown,
            grace_secs = self.config.service.shutdown_grace_secs,
            "Runtime shutting down"
        );

        self.shutdown.cancel();
        self.stopped().await;
        if let Some(monitor) = self.monitor.take() {
            let _ = monitor.await;
        }

        self.state.send_replace(LifecycleState::Stopped);
        info!(state = %LifecycleState::Stopped, "Runtime stopped");
    }
}

impl Drop for RuntimeHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
