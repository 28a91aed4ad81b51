use thiserror::Error;

/// Configuration-related errors with structured variants.
///
/// Always fatal: they are only produced while the runtime is starting.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("simulation engine rejected its configuration: {0}")]
    Engine(String),

    #[error("park configuration generation failed: {0}")]
    Generator(String),
}

/// Errors establishing a session with the stream backend.
///
/// Fatal during startup, retried as transient once the runtime is running.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("stream backend {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("authentication against {endpoint} failed: {reason}")]
    AuthenticationFailed { endpoint: String, reason: String },

    #[error("stream '{stream}' is not usable: {reason}")]
    InvalidStream { stream: String, reason: String },

    #[error("stream backend {endpoint} still unreachable after {elapsed_secs}s")]
    StartupTimeout { endpoint: String, elapsed_secs: u64 },
}

impl ConnectionError {
    /// Whether another attempt could succeed without operator intervention.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

/// Transient I/O failures on an established stream session.
#[derive(Error, Debug)]
pub enum TransientIoError {
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("{operation} failed: {reason}")]
    Disconnected {
        operation: &'static str,
        reason: String,
    },

    #[error("{operation} deferred, backing off for another {remaining_ms}ms")]
    BackingOff {
        operation: &'static str,
        remaining_ms: u64,
    },

    #[error("{operation} attempted without a connection")]
    NotConnected { operation: &'static str },
}

/// Per-run failures reported by (or around) the simulation engine.
#[derive(Error, Debug)]
pub enum SimulationError {
    /// Domain failure raised by the engine, carried as-is.
    #[error("simulation engine failed: {0}")]
    Engine(#[source] anyhow::Error),

    #[error("simulation cancelled")]
    Cancelled,

    #[error("simulation exceeded {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    #[error("simulation output rejected: {reason}")]
    InvalidOutput { reason: String },

    #[error("simulation worker panicked: {0}")]
    Panicked(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Transient(#[from] TransientIoError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("record {record_id} does not match the forecast schema: {reason}")]
    Schema { record_id: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Failures that the reconnecting adapter should count against stream health.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Connection(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
