//! Statistics module: bounded history plus per-site aggregates.

mod aggregate;
mod store;

pub use aggregate::*;
pub use store::*;
