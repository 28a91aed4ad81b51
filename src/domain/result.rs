//! Simulation output types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::forecast::{ForecastBatch, Provenance};
use super::id::RunId;
use crate::error::SimulationError;

/// Raw production series returned by the simulation engine.
///
/// Every series is aligned with the samples of the batch it was computed
/// from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    /// Park-aggregate power production per sample.
    pub park_production: Vec<f64>,
    /// Power production per turbine, keyed by turbine name.
    #[serde(default)]
    pub turbine_production: BTreeMap<String, Vec<f64>>,
}

/// A completed run, ready for publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub run_id: RunId,
    pub run_at: DateTime<Utc>,
    pub provenance: Provenance,
    pub forecast_time: Vec<DateTime<Utc>>,
    pub park_production: Vec<f64>,
    pub turbine_production: BTreeMap<String, Vec<f64>>,
}

impl SimulationResult {
    /// Combine engine output with the batch that produced it.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidOutput`] when any series does not
    /// have exactly one value per forecast sample.
    pub fn assemble(
        batch: &ForecastBatch,
        output: SimulationOutput,
        run_id: RunId,
        run_at: DateTime<Utc>,
    ) -> Result<Self, SimulationError> {
        let expected = batch.len();
        if output.park_production.len() != expected {
            return Err(SimulationError::InvalidOutput {
                reason: format!(
                    "park series has {} values for {expected} samples",
                    output.park_production.len()
                ),
            });
        }
        if let Some((turbine, series)) = output
            .turbine_production
            .iter()
            .find(|(_, series)| series.len() != expected)
        {
            return Err(SimulationError::InvalidOutput {
                reason: format!(
                    "turbine '{turbine}' has {} values for {expected} samples",
                    series.len()
                ),
            });
        }

        Ok(Self {
            run_id,
            run_at,
            provenance: batch.provenance().clone(),
            forecast_time: batch.timestamps(),
            park_production: output.park_production,
            turbine_production: output.turbine_production,
        })
    }

    /// Number of horizon steps in the result.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forecast_time.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forecast_time.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::forecast::ForecastSample;
    use chrono::TimeZone;

    fn batch(n: usize) -> ForecastBatch {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let samples = (0..n)
            .map(|i| ForecastSample::new(start + chrono::Duration::hours(i as i64), 7.0))
            .collect();
        ForecastBatch::new(Provenance::new("forecast", "5-0".into()), samples)
    }

    #[test]
    fn assemble_copies_horizon_and_provenance() {
        let batch = batch(3);
        let output = SimulationOutput {
            park_production: vec![1.0, 2.0, 3.0],
            turbine_production: BTreeMap::from([("T01".to_string(), vec![0.5, 1.0, 1.5])]),
        };

        let result =
            SimulationResult::assemble(&batch, output, RunId::new("run-1"), Utc::now()).unwrap();

        assert_eq!(result.forecast_time, batch.timestamps());
        assert_eq!(result.provenance.record.as_str(), "5-0");
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn assemble_rejects_short_park_series() {
        let output = SimulationOutput {
            park_production: vec![1.0],
            ..Default::default()
        };
        let err = SimulationResult::assemble(&batch(2), output, RunId::generate(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, SimulationError::InvalidOutput { .. }));
    }

    #[test]
    fn assemble_rejects_misaligned_turbine_series() {
        let output = SimulationOutput {
            park_production: vec![1.0, 2.0],
            turbine_production: BTreeMap::from([("T07".to_string(), vec![1.0])]),
        };
        let err = SimulationResult::assemble(&batch(2), output, RunId::generate(), Utc::now())
            .unwrap_err();
        assert!(err.to_string().contains("T07"));
    }
}
