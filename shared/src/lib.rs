//! Inventory staging engine
//!
//! Stages heterogeneous physical measurements against a product (weighed
//! containers, sealed packages, manual amounts, unit-converted readings) and
//! reduces them to one amount to submit against the product's stock record.
//! Used by the browser adapter (via WASM) and the command-line tool.

pub mod error;
pub mod models;
pub mod persistence;
pub mod sequence;
pub mod session;
pub mod snapshot;
pub mod validation;

pub use error::*;
pub use models::*;
pub use persistence::*;
pub use sequence::*;
pub use session::*;
pub use snapshot::*;
pub use validation::*;
