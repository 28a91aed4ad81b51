//! Inbound adapters: how operators drive the runtime.

pub mod cli;
