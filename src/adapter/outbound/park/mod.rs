//! Park configuration resolvers.

mod generator;
mod static_files;

pub use generator::{slug, GeneratedFiles};
pub use static_files::StaticFiles;
