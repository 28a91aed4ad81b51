//! Stream session infrastructure.

pub mod reconnecting;

pub use reconnecting::ReconnectingStream;
