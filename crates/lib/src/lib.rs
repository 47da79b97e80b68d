//! unitforge-lib: declarative units in, materialized artifacts out.
//!
//! The crate provides the building blocks of a unitforge pipeline:
//! - `Unit`: a declarative input record with a name, a kind and dependencies
//! - `resolve`: orders units so every unit follows the units it depends on
//! - `Artifact`: a generated output (file, directory) keyed by a stable ID
//! - `registry`: remembers which artifacts each processor produced
//! - `processor`: writes artifacts to disk and cleans up stale ones
//! - `Pipeline`: runs loaders, resolution, generators and processors in order

pub mod artifact;
pub mod consts;
pub mod pipeline;
pub mod processor;
pub mod registry;
pub mod resolve;
pub mod unit;
pub mod util;
