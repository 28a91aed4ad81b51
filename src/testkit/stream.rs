//! In-memory [`ForecastStream`] for testing.
//!
//! [`memory_stream`] returns a [`MemoryStream`] to hand to the code under
//! test plus a [`MemoryBackend`] handle that stays with the test. The handle
//! appends records, scripts failures, and inspects what was published and
//! acknowledged.
//!
//! Delivery follows consumer-group semantics. A fetch pages through every
//! record appended since the previous fetch, `read_count` records at a time,
//! and the newest valid one wins. Delivered records stay pending until
//! acknowledged and are redelivered once after each successful `connect()`.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{
    settle_read, DeliveredEntry, Delivery, EntryBody, ForecastBatch, ForecastSample, Provenance,
    RecordId, SimulationResult,
};
use crate::error::{ConnectionError, Error, Result, TransientIoError};
use crate::port::ForecastStream;

use super::config::INPUT_STREAM;
use super::domain::samples;

const ENDPOINT: &str = "memory://test";
/// Same page size as the default stream configuration.
const READ_COUNT: usize = 16;

/// A record as appended; `Err` holds the reason it fails validation.
type Record = std::result::Result<Vec<ForecastSample>, String>;

#[derive(Default)]
struct State {
    next_id: u64,
    log: Vec<(RecordId, Record)>,
    cursor: usize,
    read_count: usize,
    pending: Vec<RecordId>,
    acknowledged: Vec<RecordId>,
    published: Vec<SimulationResult>,

    connected: bool,
    replay_pending: bool,
    unreachable: bool,
    reject_auth: bool,
    fail_fetches: u32,
    fail_publishes: u32,
    fail_acks: u32,

    connect_count: u32,
    fetch_count: u32,
    close_count: u32,
}

impl State {
    fn check_session(&mut self, operation: &'static str) -> Result<()> {
        if self.unreachable {
            self.connected = false;
            return Err(TransientIoError::Disconnected {
                operation,
                reason: "connection reset".to_string(),
            }
            .into());
        }
        if !self.connected {
            return Err(TransientIoError::NotConnected { operation }.into());
        }
        Ok(())
    }

    fn delivered(&self, id: RecordId) -> DeliveredEntry {
        let body = match self.log.iter().find(|(record, _)| *record == id) {
            Some((_, Ok(samples))) => EntryBody::Samples(samples.clone()),
            Some((_, Err(reason))) => EntryBody::Malformed(Error::Schema {
                record_id: id.to_string(),
                reason: reason.clone(),
            }),
            None => EntryBody::Tombstone,
        };
        DeliveredEntry::new(id, body)
    }

    /// Pending records, paged like a replay from id `0`.
    fn replay(&self) -> Vec<RecordId> {
        let mut replayed = Vec::new();
        loop {
            let page: Vec<RecordId> = self
                .pending
                .iter()
                .skip(replayed.len())
                .take(self.read_count)
                .cloned()
                .collect();
            let exhausted = page.len() < self.read_count;
            replayed.extend(page);
            if exhausted {
                return replayed;
            }
        }
    }

    /// Undelivered records, paged like repeated `>` reads.
    fn deliver_new(&mut self) -> Vec<RecordId> {
        let mut fresh = Vec::new();
        loop {
            let end = (self.cursor + self.read_count).min(self.log.len());
            let page: Vec<RecordId> = self.log[self.cursor..end]
                .iter()
                .map(|(id, _)| id.clone())
                .collect();
            self.cursor = end;
            self.pending.extend(page.iter().cloned());
            let exhausted = page.len() < self.read_count;
            fresh.extend(page);
            if exhausted {
                return fresh;
            }
        }
    }

    fn settle<'a>(&mut self, markers: impl IntoIterator<Item = &'a RecordId>) {
        for marker in markers {
            if let Some(pos) = self.pending.iter().position(|id| id == marker) {
                self.pending.remove(pos);
                self.acknowledged.push(marker.clone());
            }
        }
    }
}

/// Create a connected pair of stream and control handle.
pub fn memory_stream() -> (MemoryStream, MemoryBackend) {
    let state = Arc::new(Mutex::new(State {
        read_count: READ_COUNT,
        ..State::default()
    }));
    (
        MemoryStream {
            state: Arc::clone(&state),
        },
        MemoryBackend { state },
    )
}

/// The stream side, owned by the runtime.
pub struct MemoryStream {
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl ForecastStream for MemoryStream {
    async fn connect(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.connect_count += 1;
        if state.reject_auth {
            return Err(ConnectionError::AuthenticationFailed {
                endpoint: ENDPOINT.to_string(),
                reason: "WRONGPASS invalid username-password pair".to_string(),
            }
            .into());
        }
        if state.unreachable {
            return Err(ConnectionError::Unreachable {
                endpoint: ENDPOINT.to_string(),
                reason: "connection refused".to_string(),
            }
            .into());
        }
        state.connected = true;
        state.replay_pending = true;
        Ok(())
    }

    async fn fetch_latest(&mut self) -> Result<Option<ForecastBatch>> {
        let mut state = self.state.lock();
        state.fetch_count += 1;
        state.check_session("fetch")?;
        if state.fail_fetches > 0 {
            state.fail_fetches -= 1;
            return Err(TransientIoError::Timeout {
                operation: "fetch",
                timeout_ms: 0,
            }
            .into());
        }

        let mut ids = Vec::new();
        if std::mem::take(&mut state.replay_pending) {
            ids = state.replay();
        }
        ids.extend(state.deliver_new());

        let entries = ids.into_iter().map(|id| state.delivered(id)).collect();
        match settle_read(INPUT_STREAM, entries) {
            Delivery::Idle { settled } => {
                state.settle(&settled);
                Ok(None)
            }
            Delivery::Latest { batch, .. } => Ok(Some(batch)),
            Delivery::Rejected { error, poison } => {
                state.settle(&poison);
                Err(error)
            }
        }
    }

    async fn publish(&mut self, result: &SimulationResult) -> Result<()> {
        let mut state = self.state.lock();
        state.check_session("publish")?;
        if state.fail_publishes > 0 {
            state.fail_publishes -= 1;
            return Err(TransientIoError::Timeout {
                operation: "publish",
                timeout_ms: 0,
            }
            .into());
        }
        state.published.push(result.clone());
        Ok(())
    }

    async fn acknowledge(&mut self, provenance: &Provenance) -> Result<()> {
        let mut state = self.state.lock();
        state.check_session("acknowledge")?;
        if state.fail_acks > 0 {
            state.fail_acks -= 1;
            return Err(TransientIoError::Timeout {
                operation: "acknowledge",
                timeout_ms: 0,
            }
            .into());
        }
        state.settle(provenance.markers());
        Ok(())
    }

    async fn close(&mut self) {
        let mut state = self.state.lock();
        state.connected = false;
        state.close_count += 1;
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// The test side: append input, script failures, inspect output.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    /// Append a record with the given samples.
    pub fn push_samples(&self, samples: Vec<ForecastSample>) -> RecordId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = RecordId::new(format!("{}-0", state.next_id));
        state.log.push((id.clone(), Ok(samples)));
        id
    }

    /// Append a record that fails schema validation with `reason`.
    pub fn push_malformed(&self, reason: &str) -> RecordId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = RecordId::new(format!("{}-0", state.next_id));
        state.log.push((id.clone(), Err(reason.to_string())));
        id
    }

    /// Append a record of `n` hourly samples.
    pub fn push_forecast(&self, n: usize) -> RecordId {
        self.push_samples(samples(n))
    }

    /// Records returned per read round trip.
    pub fn set_read_count(&self, count: usize) {
        self.state.lock().read_count = count.max(1);
    }

    /// Make every operation fail as if the backend went away.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// Reject credentials on every connect.
    pub fn reject_auth(&self, reject: bool) {
        self.state.lock().reject_auth = reject;
    }

    pub fn fail_fetches(&self, count: u32) {
        self.state.lock().fail_fetches = count;
    }

    pub fn fail_publishes(&self, count: u32) {
        self.state.lock().fail_publishes = count;
    }

    pub fn fail_acks(&self, count: u32) {
        self.state.lock().fail_acks = count;
    }

    pub fn published(&self) -> Vec<SimulationResult> {
        self.state.lock().published.clone()
    }

    /// Every acknowledged marker, in acknowledgement order.
    pub fn acknowledged(&self) -> Vec<RecordId> {
        self.state.lock().acknowledged.clone()
    }

    /// Delivered but unacknowledged records, in delivery order.
    pub fn pending(&self) -> Vec<RecordId> {
        self.state.lock().pending.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    pub fn connect_count(&self) -> u32 {
        self.state.lock().connect_count
    }

    pub fn fetch_count(&self) -> u32 {
        self.state.lock().fetch_count
    }

    pub fn close_count(&self) -> u32 {
        self.state.lock().close_count
    }
}
