//! Artifact model.
//!
//! Artifacts are the outputs generators emit. Each one only promises a stable
//! ID; processors pick the variants they understand with
//! `downcast_ref` and ignore the rest.

mod types;

pub use types::*;
