//! Builders for domain primitives.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::domain::{ForecastBatch, ForecastSample, Provenance, RecordId};

use super::config::INPUT_STREAM;

/// First forecast valid time used by every builder.
pub fn horizon_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// `n` hourly samples with a gently rising wind speed.
pub fn samples(n: usize) -> Vec<ForecastSample> {
    let start = horizon_start();
    (0..n)
        .map(|i| {
            ForecastSample::new(start + Duration::hours(i as i64), 4.0 + i as f64 * 0.5)
                .with_direction(225.0)
        })
        .collect()
}

/// A batch of `n` samples attributed to `record` on the test input stream.
pub fn batch(record: &str, n: usize) -> ForecastBatch {
    ForecastBatch::new(
        Provenance::new(INPUT_STREAM, RecordId::from(record)),
        samples(n),
    )
}
