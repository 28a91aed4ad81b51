//! Redis streams implementation of [`ForecastStream`].
//!
//! Consumes the input stream through a consumer group (`XREADGROUP`),
//! appends results with `XADD` and settles markers with `XACK`. Every call
//! is bounded by `io_timeout`; a timed-out or broken call drops the
//! connection so the reconnecting wrapper can re-establish it.

use std::collections::BTreeMap;
use std::future::Future;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamReadReply};
use redis::{Client, ErrorKind, FromRedisValue, RedisError};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::codec::{decode_record, encode_result};
use crate::domain::{
    settle_read, DeliveredEntry, Delivery, EntryBody, ForecastBatch, Provenance, RecordId,
    SimulationResult,
};
use crate::error::{ConfigError, ConnectionError, Error, Result, TransientIoError};
use crate::infrastructure::config::stream::{RedisConfig, StreamConfig};
use crate::port::ForecastStream;

/// Read id that replays this consumer's pending entries.
const PENDING: &str = "0";
/// Read id that delivers entries never delivered to the group.
const UNDELIVERED: &str = ">";

pub struct RedisForecastStream {
    client: Client,
    endpoint: String,
    config: StreamConfig,
    conn: Option<MultiplexedConnection>,
    replay_pending: bool,
}

impl RedisForecastStream {
    /// Build the adapter without connecting.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the connection parameters do
    /// not form a valid Redis URL.
    #[allow(clippy::result_large_err)]
    pub fn new(redis: &RedisConfig, config: StreamConfig) -> Result<Self> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            field: "host",
            reason,
        };
        let url = redis
            .connection_url()
            .ok_or_else(|| invalid(format!("'{}' is not a valid endpoint", redis.endpoint())))?;
        let client = Client::open(url.as_str()).map_err(|err| invalid(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: redis.endpoint(),
            config,
            conn: None,
            replay_pending: true,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn connection_error(&self, err: &RedisError) -> ConnectionError {
        let auth = err.kind() == ErrorKind::AuthenticationFailed
            || matches!(err.code(), Some("NOAUTH" | "WRONGPASS"));
        if auth {
            ConnectionError::AuthenticationFailed {
                endpoint: self.endpoint.clone(),
                reason: err.to_string(),
            }
        } else {
            ConnectionError::Unreachable {
                endpoint: self.endpoint.clone(),
                reason: err.to_string(),
            }
        }
    }

    /// Await a connect-phase Redis call under the I/O timeout.
    async fn within_timeout<T>(
        &self,
        fut: impl Future<Output = redis::RedisResult<T>>,
    ) -> Result<T> {
        match timeout(self.config.io_timeout(), fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(self.connection_error(&err).into()),
            Err(_) => Err(ConnectionError::Unreachable {
                endpoint: self.endpoint.clone(),
                reason: format!("no response within {}ms", self.config.io_timeout_ms),
            }
            .into()),
        }
    }

    async fn ensure_group(&self, conn: &mut MultiplexedConnection) -> Result<()> {
        let mut cmd = redis::cmd("XGROUP");
        cmd.arg("CREATE")
            .arg(&self.config.input_stream)
            .arg(&self.config.group)
            .arg(self.config.start_from.group_start_id())
            .arg("MKSTREAM");

        let created: redis::RedisResult<()> =
            match timeout(self.config.io_timeout(), cmd.query_async(conn)).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(ConnectionError::Unreachable {
                        endpoint: self.endpoint.clone(),
                        reason: "XGROUP CREATE timed out".to_string(),
                    }
                    .into())
                }
            };

        match created {
            Ok(()) => {
                info!(
                    stream = %self.config.input_stream,
                    group = %self.config.group,
                    "Consumer group created"
                );
                Ok(())
            }
            Err(err) if err.code() == Some("BUSYGROUP") => Ok(()),
            Err(err) if err.code() == Some("WRONGTYPE") => Err(ConnectionError::InvalidStream {
                stream: self.config.input_stream.clone(),
                reason: "key exists and is not a stream".to_string(),
            }
            .into()),
            Err(err) => Err(self.connection_error(&err).into()),
        }
    }

    async fn ensure_output_stream(&self, conn: &mut MultiplexedConnection) -> Result<()> {
        let mut cmd = redis::cmd("TYPE");
        cmd.arg(&self.config.output_stream);
        let kind: String = self.within_timeout(cmd.query_async(conn)).await?;
        match kind.as_str() {
            "stream" | "none" => Ok(()),
            other => Err(ConnectionError::InvalidStream {
                stream: self.config.output_stream.clone(),
                reason: format!("key exists with type '{other}'"),
            }
            .into()),
        }
    }

    /// Run a command on the live connection under the I/O timeout.
    ///
    /// Broken connections and timeouts drop the session.
    async fn query<T: FromRedisValue>(
        &mut self,
        operation: &'static str,
        cmd: &redis::Cmd,
    ) -> Result<T> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(TransientIoError::NotConnected { operation }.into());
        };
        let outcome = timeout(self.config.io_timeout(), cmd.query_async(conn)).await;

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                if err.is_connection_dropped()
                    || err.is_io_error()
                    || err.is_timeout()
                    || err.code() == Some("NOGROUP")
                {
                    self.conn = None;
                }
                Err(TransientIoError::Disconnected {
                    operation,
                    reason: err.to_string(),
                }
                .into())
            }
            Err(_) => {
                self.conn = None;
                Err(TransientIoError::Timeout {
                    operation,
                    timeout_ms: self.config.io_timeout_ms,
                }
                .into())
            }
        }
    }

    async fn read_group(&mut self, start: &str) -> Result<Vec<StreamId>> {
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.config.group)
            .arg(&self.config.consumer)
            .arg("COUNT")
            .arg(self.config.read_count)
            .arg("STREAMS")
            .arg(&self.config.input_stream)
            .arg(start);

        let reply: Option<StreamReadReply> = self.query("fetch", &cmd).await?;
        Ok(reply
            .map(|reply| reply.keys.into_iter().flat_map(|key| key.ids).collect())
            .unwrap_or_default())
    }

    /// Read every entry after `start`, `read_count` entries per round trip.
    ///
    /// The pending list is paged by the last id seen. Undelivered entries
    /// are paged by repeating `>` until a short page comes back.
    async fn read_all(&mut self, start: &str) -> Result<Vec<StreamId>> {
        let mut entries: Vec<StreamId> = Vec::new();
        let mut cursor = start.to_string();
        loop {
            let page = self.read_group(&cursor).await?;
            let exhausted = page.len() < self.config.read_count;
            if cursor != UNDELIVERED {
                if let Some(last) = page.last() {
                    cursor.clone_from(&last.id);
                }
            }
            entries.extend(page);
            if exhausted {
                return Ok(entries);
            }
        }
    }

    async fn ack(&mut self, ids: &[&RecordId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("XACK");
        cmd.arg(&self.config.input_stream).arg(&self.config.group);
        for id in ids {
            cmd.arg(id.as_str());
        }
        let acked: i64 = self.query("acknowledge", &cmd).await?;
        debug!(requested = ids.len(), acked, "Markers acknowledged");
        Ok(())
    }
}

/// Classify a raw stream entry: tombstone, decoded samples or malformed.
fn delivered_entry(entry: &StreamId) -> DeliveredEntry {
    let id = RecordId::new(entry.id.clone());
    let body = if entry.map.is_empty() {
        EntryBody::Tombstone
    } else {
        match entry_fields(entry).and_then(|fields| decode_record(&id, &fields)) {
            Ok(samples) => EntryBody::Samples(samples),
            Err(err) => EntryBody::Malformed(err),
        }
    };
    DeliveredEntry::new(id, body)
}

/// Stringify an entry's field values; a tombstone yields an empty map.
fn entry_fields(entry: &StreamId) -> Result<BTreeMap<String, String>> {
    entry
        .map
        .iter()
        .map(|(name, value)| {
            redis::from_redis_value::<String>(value)
                .map(|text| (name.clone(), text))
                .map_err(|err| Error::Schema {
                    record_id: entry.id.clone(),
                    reason: format!("field '{name}' is not a string: {err}"),
                })
        })
        .collect()
}

#[async_trait]
impl ForecastStream for RedisForecastStream {
    async fn connect(&mut self) -> Result<()> {
        self.conn = None;
        let mut conn = self
            .within_timeout(self.client.get_multiplexed_async_connection())
            .await?;

        let pong: String = self
            .within_timeout(redis::cmd("PING").query_async(&mut conn))
            .await?;
        debug!(endpoint = %self.endpoint, reply = %pong, "Redis reachable");

        self.ensure_group(&mut conn).await?;
        self.ensure_output_stream(&mut conn).await?;

        self.conn = Some(conn);
        self.replay_pending = true;
        info!(
            endpoint = %self.endpoint,
            input = %self.config.input_stream,
            output = %self.config.output_stream,
            group = %self.config.group,
            consumer = %self.config.consumer,
            "Connected to Redis streams"
        );
        Ok(())
    }

    async fn fetch_latest(&mut self) -> Result<Option<ForecastBatch>> {
        let mut entries = Vec::new();
        if self.replay_pending {
            entries = self.read_all(PENDING).await?;
            self.replay_pending = false;
            if !entries.is_empty() {
                info!(count = entries.len(), "Replaying pending records");
            }
        }
        entries.extend(self.read_all(UNDELIVERED).await?);

        let delivered = entries.iter().map(delivered_entry).collect();
        match settle_read(&self.config.input_stream, delivered) {
            Delivery::Idle { settled } => {
                // Deleted entries still pending: nothing to simulate, settle them.
                self.ack(&settled.iter().collect::<Vec<_>>()).await?;
                Ok(None)
            }
            Delivery::Latest { batch, rejected } => {
                let provenance = batch.provenance();
                for err in &rejected {
                    warn!(record = %provenance.record, error = %err, "Malformed record superseded");
                }
                if !provenance.superseded.is_empty() {
                    debug!(
                        record = %provenance.record,
                        superseded = provenance.superseded.len(),
                        "Newer forecast supersedes older records"
                    );
                }
                Ok(Some(batch))
            }
            Delivery::Rejected { error, poison } => {
                warn!(
                    error = %error,
                    records = poison.len(),
                    "No valid record in read, acknowledging as poison"
                );
                if let Err(ack_err) = self.ack(&poison.iter().collect::<Vec<_>>()).await {
                    warn!(error = %ack_err, "Poison records left pending");
                }
                Err(error)
            }
        }
    }

    async fn publish(&mut self, result: &SimulationResult) -> Result<()> {
        let mut cmd = redis::cmd("XADD");
        cmd.arg(&self.config.output_stream);
        if let Some(max_len) = self.config.max_output_len {
            cmd.arg("MAXLEN").arg("~").arg(max_len);
        }
        cmd.arg("*");
        for (field, value) in encode_result(result)? {
            cmd.arg(field).arg(value);
        }

        let id: String = self.query("publish", &cmd).await?;
        debug!(run_id = %result.run_id, output_id = %id, "Result appended");
        Ok(())
    }

    async fn acknowledge(&mut self, provenance: &Provenance) -> Result<()> {
        let markers: Vec<&RecordId> = provenance.markers().collect();
        self.ack(&markers).await
    }

    async fn close(&mut self) {
        if self.conn.take().is_some() {
            info!(endpoint = %self.endpoint, "Redis connection closed");
        } else {
            warn!(endpoint = %self.endpoint, "Close requested without an open connection");
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    fn entry(id: &str, fields: &[(&str, &str)]) -> StreamId {
        StreamId {
            id: id.to_string(),
            map: fields
                .iter()
                .map(|(name, value)| {
                    (
                        (*name).to_string(),
                        redis::Value::BulkString(value.as_bytes().to_vec()),
                    )
                })
                .collect(),
        }
    }

    fn forecast(id: &str, speeds: &str) -> StreamId {
        let times = match speeds {
            "[]" => "[]",
            _ => r#"["2024-01-01T00:00:00Z", "2024-01-01T01:00:00Z"]"#,
        };
        entry(id, &[("forecast_time", times), ("wind_speed", speeds)])
    }

    fn settle(entries: &[StreamId]) -> Delivery {
        settle_read("forecast", entries.iter().map(delivered_entry).collect())
    }

    fn adapter() -> RedisForecastStream {
        let config = testkit::config::runtime(20);
        RedisForecastStream::new(&config.redis, config.stream).unwrap()
    }

    #[test]
    fn endpoint_does_not_leak_password() {
        let mut config = testkit::config::runtime(20);
        config.redis.password = Some("hunter2".into());
        let stream = RedisForecastStream::new(&config.redis, config.stream).unwrap();
        assert_eq!(stream.endpoint(), "redis://127.0.0.1:6379/0");
    }

    #[tokio::test]
    async fn operations_without_connection_are_transient() {
        let mut stream = adapter();

        let err = stream.fetch_latest().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transient(TransientIoError::NotConnected { operation: "fetch" })
        ));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_connection_error() {
        let mut config = testkit::config::runtime(20);
        config.redis.port = 1;
        let mut stream = RedisForecastStream::new(&config.redis, config.stream).unwrap();

        let err = stream.connect().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::Unreachable { .. })
        ));
    }

    #[test]
    fn entry_without_fields_is_a_tombstone() {
        let delivered = delivered_entry(&entry("4-0", &[]));
        assert_eq!(delivered.id, RecordId::from("4-0"));
        assert!(matches!(delivered.body, EntryBody::Tombstone));
    }

    #[test]
    fn undecodable_entry_is_malformed_not_dropped() {
        let delivered = delivered_entry(&entry("5-0", &[("wind_speed", "[5.0]")]));
        assert!(matches!(
            delivered.body,
            EntryBody::Malformed(Error::Schema { ref record_id, .. }) if record_id == "5-0"
        ));
    }

    #[test]
    fn backlog_resolves_to_newest_record_with_tombstones_superseded() {
        let delivery = settle(&[
            forecast("1-0", "[4.0, 4.5]"),
            entry("2-0", &[]),
            forecast("3-0", "[7.0, 7.5]"),
        ]);

        let Delivery::Latest { batch, rejected } = delivery else {
            panic!("expected a batch, got {delivery:?}");
        };
        assert_eq!(batch.provenance().record, RecordId::from("3-0"));
        assert_eq!(
            batch.provenance().superseded,
            vec![RecordId::from("1-0"), RecordId::from("2-0")]
        );
        assert_eq!(batch.samples()[0].wind_speed, 7.0);
        assert!(rejected.is_empty());
    }

    #[test]
    fn malformed_newest_entry_falls_back_to_the_previous_forecast() {
        let delivery = settle(&[
            forecast("1-0", "[4.0, 4.5]"),
            entry("2-0", &[("forecast_time", "not json"), ("wind_speed", "[1.0]")]),
        ]);

        let Delivery::Latest { batch, rejected } = delivery else {
            panic!("expected a batch, got {delivery:?}");
        };
        assert_eq!(batch.provenance().record, RecordId::from("1-0"));
        assert_eq!(batch.provenance().superseded, vec![RecordId::from("2-0")]);
        assert_eq!(rejected.len(), 1);
    }

    #[test]
    fn empty_newest_forecast_settles_the_whole_read() {
        let delivery = settle(&[forecast("1-0", "[4.0, 4.5]"), forecast("2-0", "[]")]);

        let Delivery::Latest { batch, .. } = delivery else {
            panic!("expected a batch, got {delivery:?}");
        };
        assert!(batch.is_empty());
        let markers: Vec<&str> = batch.provenance().markers().map(RecordId::as_str).collect();
        assert_eq!(markers, vec!["1-0", "2-0"]);
    }

    #[test]
    fn only_tombstones_settle_idle() {
        let delivery = settle(&[entry("1-0", &[]), entry("2-0", &[])]);
        assert!(matches!(delivery, Delivery::Idle { ref settled } if settled.len() == 2));
    }
}
