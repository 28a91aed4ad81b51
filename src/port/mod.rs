//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      Application        │
//!     ┌──────────────┤  Domain + Port          ├──────────────┐
//!     │              └─────────────────────────┘              │
//!     │                         │                             │
//!     ▼                         ▼                             ▼
//! ┌─────────┐            ┌─────────────┐              ┌───────────┐
//! │ Stream  │            │ Simulation  │              │   Park    │
//! │ Adapter │            │   Engine    │              │  Config   │
//! └─────────┘            └─────────────┘              └───────────┘
//! ```

pub mod outbound;

pub use outbound::park::{ParkConfigResolver, SimulationFiles};
pub use outbound::simulation::SimulationEngine;
pub use outbound::stream::ForecastStream;
