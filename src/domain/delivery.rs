//! Choosing what one read of the input stream resolves to.
//!
//! A read may deliver several records at once (a backlog after an outage,
//! pending entries replayed after a reconnect). Only the newest valid record
//! is simulated. Everything else in the read is settled alongside it.

use super::forecast::{ForecastBatch, ForecastSample, Provenance};
use super::id::RecordId;
use crate::error::Error;

/// Content of one delivered stream entry.
#[derive(Debug)]
pub enum EntryBody {
    /// The entry was deleted but is still referenced by the consumer group.
    Tombstone,
    Samples(Vec<ForecastSample>),
    /// The record failed schema validation.
    Malformed(Error),
}

#[derive(Debug)]
pub struct DeliveredEntry {
    pub id: RecordId,
    pub body: EntryBody,
}

impl DeliveredEntry {
    pub fn new(id: RecordId, body: EntryBody) -> Self {
        Self { id, body }
    }
}

/// Outcome of a read.
#[derive(Debug)]
pub enum Delivery {
    /// Nothing to simulate. `settled` can be acknowledged right away.
    Idle { settled: Vec<RecordId> },
    /// The newest valid record. Every other entry of the read is carried as
    /// a superseded marker, including malformed ones listed in `rejected`.
    Latest {
        batch: ForecastBatch,
        rejected: Vec<Error>,
    },
    /// No entry passed validation. `error` is the newest record's.
    /// `poison` holds every marker of the read.
    Rejected { error: Error, poison: Vec<RecordId> },
}

/// Resolve the entries of one read, given in stream order.
///
/// A valid record with zero samples still wins over older ones; the caller
/// treats its batch as "no new input" and settles the whole read.
pub fn settle_read(stream: &str, entries: Vec<DeliveredEntry>) -> Delivery {
    let chosen = entries
        .iter()
        .rposition(|entry| matches!(entry.body, EntryBody::Samples(_)));

    let mut markers = Vec::with_capacity(entries.len());
    let mut rejected = Vec::new();
    let mut selected = None;
    for (index, entry) in entries.into_iter().enumerate() {
        match entry.body {
            EntryBody::Samples(samples) if Some(index) == chosen => {
                selected = Some((entry.id, samples));
                continue;
            }
            EntryBody::Malformed(error) => rejected.push(error),
            EntryBody::Samples(_) | EntryBody::Tombstone => {}
        }
        markers.push(entry.id);
    }

    match selected {
        Some((record, samples)) => {
            let provenance = Provenance::new(stream, record).with_superseded(markers);
            Delivery::Latest {
                batch: ForecastBatch::new(provenance, samples),
                rejected,
            }
        }
        None => match rejected.pop() {
            Some(error) => Delivery::Rejected {
                error,
                poison: markers,
            },
            None => Delivery::Idle { settled: markers },
        },
    }
}
