//! In-memory registry.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use super::ArtifactRegistry;
use super::types::{RegistryEntry, RegistryError};

type Scopes = BTreeMap<String, BTreeMap<String, RegistryEntry>>;

/// Registry kept entirely in memory.
///
/// A single lock covers every scope: writers take it exclusively, readers
/// share it. Nothing under the lock performs I/O.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
  scopes: RwLock<Scopes>,
}

impl MemoryRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Copy of every scope with its entries ordered by artifact ID.
  pub fn snapshot(&self) -> BTreeMap<String, Vec<RegistryEntry>> {
    let scopes = self.scopes.read().unwrap_or_else(PoisonError::into_inner);
    scopes
      .iter()
      .map(|(processor, entries)| (processor.clone(), entries.values().cloned().collect()))
      .collect()
  }

  /// Replace every scope with `scopes`. Later duplicates of an ID win.
  pub fn replace(&self, scopes: BTreeMap<String, Vec<RegistryEntry>>) {
    let rebuilt: Scopes = scopes
      .into_iter()
      .filter(|(_, entries)| !entries.is_empty())
      .map(|(processor, entries)| {
        let by_id = entries
          .into_iter()
          .map(|entry| (entry.artifact_id.clone(), entry))
          .collect();
        (processor, by_id)
      })
      .collect();

    *self.scopes.write().unwrap_or_else(PoisonError::into_inner) = rebuilt;
  }

  /// Total number of entries across all scopes.
  pub fn len(&self) -> usize {
    let scopes = self.scopes.read().unwrap_or_else(PoisonError::into_inner);
    scopes.values().map(BTreeMap::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl ArtifactRegistry for MemoryRegistry {
  fn add(&self, processor: &str, entry: RegistryEntry) {
    debug!(processor, artifact = %entry.artifact_id, "registering artifact");
    let mut scopes = self.scopes.write().unwrap_or_else(PoisonError::into_inner);
    scopes
      .entry(processor.to_string())
      .or_default()
      .insert(entry.artifact_id.clone(), entry);
  }

  fn remove(&self, processor: &str, artifact_id: &str) {
    let mut scopes = self.scopes.write().unwrap_or_else(PoisonError::into_inner);
    let Some(entries) = scopes.get_mut(processor) else {
      return;
    };

    if entries.remove(artifact_id).is_some() {
      debug!(processor, artifact = %artifact_id, "unregistered artifact");
    }
    if entries.is_empty() {
      scopes.remove(processor);
    }
  }

  fn find_by_id(&self, processor: &str, artifact_id: &str) -> Option<RegistryEntry> {
    let scopes = self.scopes.read().unwrap_or_else(PoisonError::into_inner);
    scopes.get(processor)?.get(artifact_id).cloned()
  }

  fn find_all(&self, processor: &str) -> Vec<RegistryEntry> {
    let scopes = self.scopes.read().unwrap_or_else(PoisonError::into_inner);
    scopes
      .get(processor)
      .map(|entries| entries.values().cloned().collect())
      .unwrap_or_default()
  }

  fn load(&self) -> Result<(), RegistryError> {
    Ok(())
  }

  fn save(&self) -> Result<(), RegistryError> {
    Ok(())
  }
}
