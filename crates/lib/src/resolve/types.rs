//! Types shared by dependency resolution.

use thiserror::Error;

use crate::unit::Unit;

/// Contributes extra dependency edges for units of the kinds it supports.
///
/// Providers are consulted in registration order; names they return for a
/// unit are merged with the unit's own declared dependencies.
pub trait DependencyProvider: Send + Sync {
  /// Whether this provider has anything to say about `unit`.
  fn supports(&self, unit: &dyn Unit) -> bool;

  /// Names of the units `unit` depends on according to this provider.
  fn provide(&self, unit: &dyn Unit) -> Vec<String>;
}

/// Errors that can occur while building or resolving a dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
  /// A unit depends on a name no unit carries.
  #[error("unit '{unit}' depends on '{dependency}', which is not defined")]
  Unresolved { unit: String, dependency: String },

  /// The remaining units depend on each other.
  #[error("circular dependency between units: {}", units.join(", "))]
  Circular { units: Vec<String> },

  /// Two units share the same name.
  #[error("duplicate unit name: {0}")]
  DuplicateUnit(String),
}
