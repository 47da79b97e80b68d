//! Unit model.
//!
//! Units are the declarative input records of a pipeline run. A loader
//! produces them from a [`Source`]; everything downstream only reads them
//! through the [`Unit`] trait.

mod types;

pub use types::*;
