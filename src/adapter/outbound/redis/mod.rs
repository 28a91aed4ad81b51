//! Redis streams adapter.

pub mod codec;
mod stream;

pub use stream::RedisForecastStream;
