use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A set of unit names a unit depends on.
///
/// Ordered so that iteration (and therefore error reporting) is deterministic.
pub type DependencySet = BTreeSet<String>;

/// Where a source lives, e.g. a file path or an URL.
///
/// The pipeline never interprets the location itself; it only hands it to the
/// source loaders and uses it in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceDescriptor(pub String);

impl fmt::Display for SourceDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<&str> for SourceDescriptor {
  fn from(value: &str) -> Self {
    Self(value.to_string())
  }
}

impl From<String> for SourceDescriptor {
  fn from(value: String) -> Self {
    Self(value)
  }
}

/// Raw declarative input as read by a source loader.
///
/// Immutable once created: the fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
  location: SourceDescriptor,
  data: Vec<u8>,
  format: String,
}

impl Source {
  pub fn new(location: impl Into<SourceDescriptor>, data: impl Into<Vec<u8>>, format: impl Into<String>) -> Self {
    Self {
      location: location.into(),
      data: data.into(),
      format: format.into(),
    }
  }

  /// The location the source was read from.
  pub fn location(&self) -> &SourceDescriptor {
    &self.location
  }

  /// The raw bytes of the source.
  pub fn data(&self) -> &[u8] {
    &self.data
  }

  /// The detected format tag (e.g. `yaml`, `json`).
  pub fn format(&self) -> &str {
    &self.format
  }
}

/// A declaratively defined record processed by the pipeline.
///
/// Implementations are produced by a [`UnitLoader`](crate::pipeline::UnitLoader)
/// and shared read-only as `Arc<dyn Unit>`. Generators that need a concrete
/// type downcast through [`Unit::as_any`].
pub trait Unit: fmt::Debug + Send + Sync + 'static {
  /// Unique name of the unit within a run.
  fn name(&self) -> &str;

  /// Kind tag used by dependency providers and generators to select units.
  fn kind(&self) -> &str;

  /// Human readable description.
  fn description(&self) -> &str {
    ""
  }

  /// Names of the units this unit declares a dependency on.
  fn dependencies(&self) -> &[String];

  /// The source this unit was loaded from.
  fn source(&self) -> &Source;

  fn as_any(&self) -> &dyn Any;
}

/// A general purpose unit carrying an arbitrary JSON body.
///
/// Loaders that do not need a dedicated type can emit `UnitDef`s and let the
/// generators interpret `body`.
#[derive(Debug, Clone)]
pub struct UnitDef {
  pub name: String,
  pub kind: String,
  pub description: String,
  pub dependencies: Vec<String>,
  pub body: serde_json::Value,
  pub source: Arc<Source>,
}

impl UnitDef {
  pub fn new(name: impl Into<String>, kind: impl Into<String>, source: Arc<Source>) -> Self {
    Self {
      name: name.into(),
      kind: kind.into(),
      description: String::new(),
      dependencies: Vec::new(),
      body: serde_json::Value::Null,
      source,
    }
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = description.into();
    self
  }

  pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.dependencies = dependencies.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_body(mut self, body: serde_json::Value) -> Self {
    self.body = body;
    self
  }
}

impl Unit for UnitDef {
  fn name(&self) -> &str {
    &self.name
  }

  fn kind(&self) -> &str {
    &self.kind
  }

  fn description(&self) -> &str {
    &self.description
  }

  fn dependencies(&self) -> &[String] {
    &self.dependencies
  }

  fn source(&self) -> &Source {
    &self.source
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}
