//! Per-processor registry view.

use std::fmt;
use std::sync::Arc;

use super::ArtifactRegistry;
use super::types::{Metadata, RegistryEntry};

/// A registry handle bound to one processor's scope.
///
/// Cheap to clone; clones share the underlying registry.
#[derive(Clone)]
pub struct ProcessorRegistry {
  registry: Arc<dyn ArtifactRegistry>,
  processor: String,
}

impl ProcessorRegistry {
  pub fn new(registry: Arc<dyn ArtifactRegistry>, processor: impl Into<String>) -> Self {
    Self {
      registry,
      processor: processor.into(),
    }
  }

  /// Name of the scope this view is bound to.
  pub fn processor(&self) -> &str {
    &self.processor
  }

  pub fn add(&self, artifact_id: impl Into<String>, metadata: Option<Metadata>) {
    self
      .registry
      .add(&self.processor, RegistryEntry::new(artifact_id, metadata));
  }

  /// Put a previously removed entry back unchanged.
  pub fn restore(&self, entry: RegistryEntry) {
    self.registry.add(&self.processor, entry);
  }

  pub fn remove(&self, artifact_id: &str) {
    self.registry.remove(&self.processor, artifact_id);
  }

  pub fn find_by_id(&self, artifact_id: &str) -> Option<RegistryEntry> {
    self.registry.find_by_id(&self.processor, artifact_id)
  }

  pub fn find_all(&self) -> Vec<RegistryEntry> {
    self.registry.find_all(&self.processor)
  }
}

impl fmt::Debug for ProcessorRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ProcessorRegistry")
      .field("processor", &self.processor)
      .finish_non_exhaustive()
  }
}
