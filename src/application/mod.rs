//! Application services (use cases).
//!
//! The scheduler drives the consume → simulate → publish cycle against the
//! outbound ports; it knows nothing about Redis or the engine process.

pub mod scheduler;
