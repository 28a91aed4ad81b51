//! Runtime lifecycle: startup, running state and graceful shutdown.
//!
//! ```text
//! Initializing ──start──► Running ──stop──► ShuttingDown ──► Stopped
//! ```
//!
//! Stream degradation is tracked separately ([`StreamHealth`]) and never
//! changes the outer state.

mod handle;
mod monitor;

pub use handle::RuntimeHandle;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::application::scheduler::{ExecutionSlot, RunContext, RunScheduler, TickState};
use crate::domain::{LifecycleState, StreamHealth};
use crate::error::Result;
use crate::infrastructure::bootstrap::{build_engine, build_stream, resolve_simulation_files};
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::stream::ReconnectingStream;
use crate::port::{ForecastStream, SimulationEngine};

/// Where the runtime configuration comes from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// A TOML file, loaded and validated at startup.
    File(PathBuf),
    /// A configuration built in code, validated at startup.
    Loaded(Config),
}

impl ConfigSource {
    #[allow(clippy::result_large_err)]
    fn load(self) -> Result<Config> {
        match self {
            Self::File(path) => Config::load(path),
            Self::Loaded(config) => {
                config.validate()?;
                Ok(config)
            }
        }
    }
}

/// Start the runtime with the shipped adapters.
///
/// The engine is built (and checks its configuration) before the stream is
/// connected, so a bad park file fails fast without waiting on the backend.
///
/// # Errors
///
/// Returns `ConfigError` for malformed configuration or engine setup, and
/// `ConnectionError` when the stream backend cannot be reached within the
/// startup timeout or rejects the session.
pub async fn start(source: ConfigSource) -> Result<RuntimeHandle> {
    let config = source.load()?;
    let files = resolve_simulation_files(&config.simulation)?;
    let engine = build_engine(&config, &files)?;
    let stream = build_stream(&config)?;
    start_with(config, stream, engine).await
}

/// Start the runtime with caller-provided stream and engine.
///
/// # Errors
///
/// Same as [`start`], minus configuration loading. The configuration is
/// validated before the stream is touched.
pub async fn start_with(
    config: Config,
    stream: Box<dyn ForecastStream>,
    engine: Arc<dyn SimulationEngine>,
) -> Result<RuntimeHandle> {
    config.validate()?;
    let (state, _) = watch::channel(LifecycleState::Initializing);
    info!(
        state = %LifecycleState::Initializing,
        backend = stream.backend_name(),
        engine = engine.name(),
        "Runtime starting"
    );

    let mut stream = ReconnectingStream::new(stream, config.reconnection.clone());
    stream
        .connect_within(config.reconnection.startup_timeout())
        .await?;
    let health: watch::Receiver<StreamHealth> = stream.health();

    let shutdown = CancellationToken::new();
    let ctx = RunContext::new(
        ExecutionSlot::new(TickState::new(stream)),
        engine,
        shutdown.clone(),
    )
    .with_simulation_timeout(config.service.simulation_timeout());
    let scheduler = RunScheduler::new(
        ctx,
        config.service.cadence(),
        config.service.shutdown_grace(),
    )?;
    let reports = scheduler.subscribe();

    let scheduler_task = tokio::spawn(scheduler.run());
    let monitor_task = tokio::spawn(monitor::watch_stream_health(
        health.clone(),
        shutdown.clone(),
    ));

    state.send_replace(LifecycleState::Running);
    info!(
        state = %LifecycleState::Running,
        cadence_secs = config.service.cadence().as_secs(),
        input = %config.stream.input_stream,
        output = %config.stream.output_stream,
        "Runtime running"
    );

    Ok(RuntimeHandle::new(
        Arc::new(config),
        state,
        health,
        shutdown,
        scheduler_task,
        monitor_task,
        reports,
    ))
}
