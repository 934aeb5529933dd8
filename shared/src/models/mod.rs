//! Domain models for inventory staging

mod conversion;
mod entry;
mod staging;

pub use conversion::*;
pub use entry::*;
pub use staging::*;
