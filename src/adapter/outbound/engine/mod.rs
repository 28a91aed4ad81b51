//! Simulation engine adapters.

mod process;

pub use process::ProcessEngine;
