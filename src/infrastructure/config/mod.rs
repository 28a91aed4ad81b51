//! Infrastructure configuration modules.

pub mod logging;
pub mod service;
pub mod settings;
pub mod simulation;
pub mod stream;
