//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the runtime's external collaborators: the stream
//! backend, the simulation engine and the park configuration source.

pub mod park;
pub mod simulation;
pub mod stream;
