//! Outbound adapters: implementations of the ports in [`crate::port`].

pub mod engine;
pub mod park;
pub mod redis;
