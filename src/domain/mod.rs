//! Backend-agnostic domain types.

mod delivery;
mod forecast;
mod id;
mod result;
mod run_state;
mod status;

pub use delivery::{settle_read, DeliveredEntry, Delivery, EntryBody};
pub use forecast::{ForecastBatch, ForecastSample, Provenance};
pub use id::{RecordId, RunId};
pub use result::{SimulationOutput, SimulationResult};
pub use run_state::{RunState, TickOutcome};
pub use status::{LifecycleState, StreamHealth};
