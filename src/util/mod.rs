//! Utility types shared across the crate.
//!
//! - [`Error`] / [`Result`] / [`BackendError`] - Error handling
//! - Math type re-exports from glam and small sampling helpers

mod error;
mod math;

pub use error::*;
pub use math::*;
