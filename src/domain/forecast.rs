//! Forecast input types.
//!
//! A [`ForecastBatch`] is what one tick consumes: the samples of a single
//! forecast record plus the provenance needed to acknowledge it afterwards.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::RecordId;

/// One timestamped forecast sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    /// Forecast valid time.
    pub time: DateTime<Utc>,
    /// Wind speed in m/s.
    pub wind_speed: f64,
    /// Wind direction in degrees, when the forecast provides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<f64>,
    /// Any further per-sample channels (temperature, pressure, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub channels: BTreeMap<String, f64>,
}

impl ForecastSample {
    pub fn new(time: DateTime<Utc>, wind_speed: f64) -> Self {
        Self {
            time,
            wind_speed,
            wind_direction: None,
            channels: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_direction(mut self, degrees: f64) -> Self {
        self.wind_direction = Some(degrees);
        self
    }
}

/// Where a batch came from and which markers settle it.
///
/// `superseded` holds the other records delivered in the same read as
/// `record`. They are acknowledged together with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub stream: String,
    pub record: RecordId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub superseded: Vec<RecordId>,
}

impl Provenance {
    pub fn new(stream: impl Into<String>, record: RecordId) -> Self {
        Self {
            stream: stream.into(),
            record,
            superseded: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_superseded(mut self, superseded: Vec<RecordId>) -> Self {
        self.superseded = superseded;
        self
    }

    /// Every marker this provenance settles, in delivery order.
    pub fn markers(&self) -> impl Iterator<Item = &RecordId> {
        self.superseded.iter().chain(std::iter::once(&self.record))
    }
}

/// An immutable, ordered batch of forecast samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastBatch {
    provenance: Provenance,
    samples: Vec<ForecastSample>,
}

impl ForecastBatch {
    pub fn new(provenance: Provenance, samples: Vec<ForecastSample>) -> Self {
        Self {
            provenance,
            samples,
        }
    }

    #[must_use]
    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    #[must_use]
    pub fn samples(&self) -> &[ForecastSample] {
        &self.samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// A batch with no samples counts as "no new input".
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Forecast horizon, in sample order.
    #[must_use]
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.samples.iter().map(|s| s.time).collect()
    }
}
