//! Repository layer: tenant-scoped database operations.
//!
//! All public functions are re-exported here.

mod extraction;

pub use extraction::*;
