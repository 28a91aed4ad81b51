//! Stream names and Redis connection parameters.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// Where to start reading when the consumer group does not exist yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartFrom {
    /// Only records appended after the group is created.
    #[default]
    Latest,
    /// Every record still retained by the stream.
    Beginning,
}

impl StartFrom {
    /// Redis id used with `XGROUP CREATE`.
    #[must_use]
    pub const fn group_start_id(self) -> &'static str {
        match self {
            Self::Latest => "$",
            Self::Beginning => "0",
        }
    }
}

/// Input/output stream configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Stream the forecasts arrive on. Required.
    #[serde(default)]
    pub input_stream: String,
    /// Stream results are appended to. Required.
    #[serde(default)]
    pub output_stream: String,
    /// Consumer group holding the durable cursor.
    #[serde(default = "default_group")]
    pub group: String,
    /// Consumer name within the group.
    #[serde(default = "default_consumer")]
    pub consumer: String,
    /// Maximum records read per fetch; the newest wins.
    #[serde(default = "default_read_count")]
    pub read_count: usize,
    /// Per-call timeout for stream operations (milliseconds).
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
    #[serde(default)]
    pub start_from: StartFrom,
    /// Approximate cap on the output stream length.
    #[serde(default)]
    pub max_output_len: Option<usize>,
}

fn default_group() -> String {
    "eolica-runtime".to_string()
}

fn default_consumer() -> String {
    "eolica-runtime-1".to_string()
}

const fn default_read_count() -> usize {
    16
}

const fn default_io_timeout_ms() -> u64 {
    5000
}

impl StreamConfig {
    #[must_use]
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            input_stream: String::new(),
            output_stream: String::new(),
            group: default_group(),
            consumer: default_consumer(),
            read_count: default_read_count(),
            io_timeout_ms: default_io_timeout_ms(),
            start_from: StartFrom::default(),
            max_output_len: None,
        }
    }
}

/// Redis connection parameters.
///
/// The password may also come from the `REDIS_PASSWORD` environment variable,
/// which takes precedence over the file.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub db: i64,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    6379
}

impl RedisConfig {
    /// Endpoint string safe for logs (no credentials).
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }

    /// Full connection URL including credentials.
    ///
    /// Returns `None` when the host cannot form a valid URL.
    #[must_use]
    pub fn connection_url(&self) -> Option<Url> {
        let mut url = Url::parse(&self.endpoint()).ok()?;
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            url.set_password(Some(password)).ok()?;
        }
        Some(url)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db: 0,
            password: None,
        }
    }
}
