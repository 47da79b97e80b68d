//! Dependency resolution.
//!
//! Turns the unordered set of loaded units into a processing order in which
//! every unit comes after all the units it depends on. Edges come from each
//! unit's declared dependencies plus whatever the registered
//! [`DependencyProvider`]s contribute.

mod graph;
mod types;

use std::sync::Arc;

use crate::unit::Unit;

pub use graph::DependencyGraph;
pub use types::{DependencyProvider, ResolveError};

/// Resolve `units` into dependency order.
///
/// Shorthand for [`DependencyGraph::build`] followed by
/// [`DependencyGraph::resolve`].
pub fn resolve(
  units: &[Arc<dyn Unit>],
  providers: &[Arc<dyn DependencyProvider>],
) -> Result<Vec<Arc<dyn Unit>>, ResolveError> {
  DependencyGraph::build(units, providers)?.resolve()
}
