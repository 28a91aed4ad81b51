//! Infrastructure layer.
//!
//! Provides technical concerns that support the application without containing
//! business logic. This layer handles configuration, stream session
//! management, health reporting and the runtime lifecycle.
//!
//! # Submodules
//!
//! - [`bootstrap`] - Composition root for runtime wiring
//! - [`config`] - Configuration loading and validation
//! - [`health`] - Static and live health checks
//! - [`lifecycle`] - Startup, running state and graceful shutdown
//! - [`stream`] - Reconnecting stream session

pub mod bootstrap;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod stream;
