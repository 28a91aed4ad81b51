//! Reconnecting wrapper for [`ForecastStream`].
//!
//! Adds exponential backoff and health tracking to any stream backend. The
//! wrapper never blocks a tick waiting for the backend: while a backoff
//! window is open, operations fail fast with
//! [`TransientIoError::BackingOff`] and the next tick tries again.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::domain::{ForecastBatch, Provenance, SimulationResult, StreamHealth};
use crate::error::{ConnectionError, Error, Result, TransientIoError};
use crate::infrastructure::config::service::ReconnectionConfig;
use crate::port::ForecastStream;

/// Wrapper that adds automatic reconnection to any [`ForecastStream`].
///
/// Failures are counted per consecutive transient error. Once the count
/// reaches `degraded_after`, [`StreamHealth::Degraded`] is published on the
/// health channel; the first successful operation afterwards publishes
/// [`StreamHealth::Healthy`] again.
pub struct ReconnectingStream<S: ForecastStream> {
    /// The underlying stream being wrapped.
    inner: S,
    /// Reconnection and backoff configuration.
    config: ReconnectionConfig,
    /// Current consecutive failure count.
    consecutive_failures: u32,
    /// Current backoff delay in milliseconds.
    current_delay_ms: u64,
    /// No reconnect attempt before this instant.
    retry_at: Option<Instant>,
    /// Whether the inner stream holds a live session.
    connected: bool,
    health: watch::Sender<StreamHealth>,
}

impl<S: ForecastStream> ReconnectingStream<S> {
    /// Wrap a stream. It starts disconnected; call
    /// [`connect_within`](Self::connect_within) or let the first operation
    /// connect lazily.
    pub fn new(inner: S, config: ReconnectionConfig) -> Self {
        let initial_delay = config.initial_delay_ms;
        let (health, _) = watch::channel(StreamHealth::Healthy);
        Self {
            inner,
            config,
            consecutive_failures: 0,
            current_delay_ms: initial_delay,
            retry_at: None,
            connected: false,
            health,
        }
    }

    /// Subscribe to health transitions.
    pub fn health(&self) -> watch::Receiver<StreamHealth> {
        self.health.subscribe()
    }

    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Establish the first session, retrying reachability failures with
    /// backoff until `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns non-retryable [`ConnectionError`]s (bad credentials, unusable
    /// stream) immediately, and [`ConnectionError::StartupTimeout`] once the
    /// deadline would be exceeded by the next wait.
    pub async fn connect_within(&mut self, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        let deadline = started + timeout;

        loop {
            let err = match self.inner.connect().await {
                Ok(()) => {
                    self.connected = true;
                    self.reset_backoff();
                    info!(backend = self.inner.backend_name(), "Stream session established");
                    return Ok(());
                }
                Err(Error::Connection(err)) if !err.is_retryable() => {
                    return Err(err.into());
                }
                Err(err) if err.is_transient() => err,
                Err(err) => return Err(err),
            };

            self.record_failure();
            let delay = self.retry_at.map_or(Duration::ZERO, |at| {
                at.saturating_duration_since(Instant::now())
            });
            if Instant::now() + delay >= deadline {
                let endpoint = match &err {
                    Error::Connection(ConnectionError::Unreachable { endpoint, .. }) => {
                        endpoint.clone()
                    }
                    _ => self.inner.backend_name().to_string(),
                };
                return Err(ConnectionError::StartupTimeout {
                    endpoint,
                    elapsed_secs: started.elapsed().as_secs().max(timeout.as_secs()),
                }
                .into());
            }

            warn!(
                error = %err,
                delay_ms = delay.as_millis() as u64,
                attempt = self.consecutive_failures,
                "Stream backend unreachable at startup, retrying"
            );
            sleep(delay).await;
        }
    }

    /// Reset backoff state after a successful operation.
    fn reset_backoff(&mut self) {
        self.consecutive_failures = 0;
        self.current_delay_ms = self.config.initial_delay_ms;
        self.retry_at = None;
        self.health.send_if_modified(|health| {
            let changed = health.is_degraded();
            *health = StreamHealth::Healthy;
            changed
        });
    }

    /// Calculate the next backoff delay using exponential backoff with jitter.
    ///
    /// Returns the current delay and advances the internal delay state for
    /// the next call.
    fn next_delay(&mut self) -> Duration {
        let base_delay = Duration::from_millis(self.current_delay_ms);
        let delay = base_delay + Duration::from_millis(jitter_ms(base_delay));

        let next_delay = (self.current_delay_ms as f64 * self.config.backoff_multiplier) as u64;
        self.current_delay_ms = next_delay.min(self.config.max_delay_ms);

        delay
    }

    /// Record a transient failure and open the next backoff window.
    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        self.connected = false;
        let delay = self.next_delay();
        self.retry_at = Some(Instant::now() + delay);

        if self.consecutive_failures >= self.config.degraded_after {
            let failures = self.consecutive_failures;
            self.health.send_if_modified(|health| {
                let degraded = StreamHealth::Degraded {
                    consecutive_failures: failures,
                };
                let changed = *health != degraded;
                *health = degraded;
                changed
            });
        }
    }

    /// Reconnect if the session was lost and the backoff window has passed.
    async fn ensure_connected(&mut self, operation: &'static str) -> Result<()> {
        if self.connected {
            return Ok(());
        }
        if let Some(at) = self.retry_at {
            let now = Instant::now();
            if now < at {
                return Err(TransientIoError::BackingOff {
                    operation,
                    remaining_ms: at.duration_since(now).as_millis() as u64,
                }
                .into());
            }
        }

        debug!(
            operation,
            attempt = self.consecutive_failures + 1,
            "Reconnecting stream session"
        );
        match self.inner.connect().await {
            Ok(()) => {
                info!(
                    failures = self.consecutive_failures,
                    "Stream session re-established"
                );
                self.connected = true;
                Ok(())
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    /// Fold an operation result into the backoff and health state.
    fn observe<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                if self.consecutive_failures > 0 {
                    info!(
                        failures = self.consecutive_failures,
                        "Stream operation succeeded, resetting failure count"
                    );
                    self.reset_backoff();
                }
                Ok(value)
            }
            Err(err) if err.is_transient() => {
                self.record_failure();
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}

/// Up to 20% random jitter to prevent synchronized reconnection storms.
fn jitter_ms(base_delay: Duration) -> u64 {
    let jitter_range_ms = (base_delay.as_millis() as u64) / 5;
    if jitter_range_ms == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..=jitter_range_ms)
}

#[async_trait]
impl<S: ForecastStream> ForecastStream for ReconnectingStream<S> {
    async fn connect(&mut self) -> Result<()> {
        let result = self.inner.connect().await;
        if result.is_ok() {
            self.connected = true;
        }
        self.observe(result)
    }

    async fn fetch_latest(&mut self) -> Result<Option<ForecastBatch>> {
        self.ensure_connected("fetch").await?;
        let result = self.inner.fetch_latest().await;
        self.observe(result)
    }

    async fn publish(&mut self, result: &SimulationResult) -> Result<()> {
        self.ensure_connected("publish").await?;
        let outcome = self.inner.publish(result).await;
        self.observe(outcome)
    }

    async fn acknowledge(&mut self, provenance: &Provenance) -> Result<()> {
        self.ensure_connected("acknowledge").await?;
        let result = self.inner.acknowledge(provenance).await;
        self.observe(result)
    }

    async fn close(&mut self) {
        if self.connected {
            self.inner.close().await;
        }
        self.connected = false;
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}
