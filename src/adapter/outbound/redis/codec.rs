//! Record encoding for Redis stream entries.
//!
//! Every field value is a JSON document stored as a string. Input records
//! carry parallel arrays (`forecast_time`, `wind_speed`, optional
//! `wind_direction`, optional numeric channels); output records carry the
//! result series and their provenance.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::{ForecastSample, RecordId, SimulationResult};
use crate::error::{Error, Result};

pub const FORECAST_TIME: &str = "forecast_time";
pub const WIND_SPEED: &str = "wind_speed";
pub const WIND_DIRECTION: &str = "wind_direction";

/// Timestamp layout some producers use instead of RFC 3339.
const NAIVE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn schema(record: &RecordId, reason: impl Into<String>) -> Error {
    Error::Schema {
        record_id: record.to_string(),
        reason: reason.into(),
    }
}

fn field<T: DeserializeOwned>(
    record: &RecordId,
    fields: &BTreeMap<String, String>,
    name: &str,
) -> Result<Option<T>> {
    fields
        .get(name)
        .map(|raw| {
            serde_json::from_str(raw)
                .map_err(|err| schema(record, format!("field '{name}': {err}")))
        })
        .transpose()
}

fn parse_time(record: &RecordId, raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Ok(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, NAIVE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| schema(record, format!("unparseable forecast_time '{raw}'")))
}

/// Decode an input record into samples.
///
/// Non-array fields are metadata and ignored; numeric arrays other than the
/// well-known ones become per-sample channels.
///
/// # Errors
///
/// Returns [`Error::Schema`] when a required field is missing or malformed,
/// or when the arrays do not all have the same length.
pub fn decode_record(
    record: &RecordId,
    fields: &BTreeMap<String, String>,
) -> Result<Vec<ForecastSample>> {
    let times: Vec<String> = field(record, fields, FORECAST_TIME)?
        .ok_or_else(|| schema(record, "missing field 'forecast_time'"))?;
    let speeds: Vec<f64> = field(record, fields, WIND_SPEED)?
        .ok_or_else(|| schema(record, "missing field 'wind_speed'"))?;
    let directions: Option<Vec<f64>> = field(record, fields, WIND_DIRECTION)?;

    let expected = times.len();
    let check_len = |name: &str, len: usize| {
        if len == expected {
            Ok(())
        } else {
            Err(schema(
                record,
                format!("field '{name}' has {len} values, forecast_time has {expected}"),
            ))
        }
    };
    check_len(WIND_SPEED, speeds.len())?;
    if let Some(directions) = &directions {
        check_len(WIND_DIRECTION, directions.len())?;
    }

    let mut channels: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for (name, raw) in fields {
        if matches!(name.as_str(), FORECAST_TIME | WIND_SPEED | WIND_DIRECTION) {
            continue;
        }
        let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) else {
            continue;
        };
        let Some(values) = items.iter().map(Value::as_f64).collect::<Option<Vec<f64>>>() else {
            continue;
        };
        check_len(name.as_str(), values.len())?;
        channels.insert(name.as_str(), values);
    }

    times
        .iter()
        .enumerate()
        .map(|(i, raw)| -> Result<ForecastSample> {
            let mut sample = ForecastSample::new(parse_time(record, raw)?, speeds[i]);
            if let Some(directions) = &directions {
                sample = sample.with_direction(directions[i]);
            }
            sample.channels = channels
                .iter()
                .map(|(name, values)| ((*name).to_string(), values[i]))
                .collect();
            Ok(sample)
        })
        .collect()
}

/// Encode a result as `(field, json)` pairs, in a stable order.
///
/// # Errors
///
/// Returns [`Error::Json`] if a value cannot be serialized.
pub fn encode_result(result: &SimulationResult) -> Result<Vec<(&'static str, String)>> {
    Ok(vec![
        ("run_id", serde_json::to_string(&result.run_id)?),
        ("run_at", serde_json::to_string(&result.run_at)?),
        ("source_stream", serde_json::to_string(&result.provenance.stream)?),
        ("source_id", serde_json::to_string(&result.provenance.record)?),
        (FORECAST_TIME, serde_json::to_string(&result.forecast_time)?),
        ("park_production", serde_json::to_string(&result.park_production)?),
        (
            "turbine_production",
            serde_json::to_string(&result.turbine_production)?,
        ),
    ])
}
