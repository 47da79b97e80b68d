//! Artifact registry.
//!
//! The registry remembers which artifacts each processor has produced so a
//! later run can clean up the ones that are no longer generated. Entries are
//! scoped by processor name; within a scope an artifact ID is unique.
//!
//! Two implementations share the [`ArtifactRegistry`] contract:
//! - [`MemoryRegistry`]: process-local, `load`/`save` do nothing
//! - [`LedgerRegistry`]: wraps a `MemoryRegistry` and persists it to a JSON ledger
//!
//! Processors never see the registry directly; they receive a
//! [`ProcessorRegistry`] bound to their own scope.

mod ledger;
mod memory;
mod types;
mod view;

pub use ledger::LedgerRegistry;
pub use memory::MemoryRegistry;
pub use types::{Metadata, RegistryEntry, RegistryError};
pub use view::ProcessorRegistry;

/// Storage for registry entries, safe to share between concurrent workers.
pub trait ArtifactRegistry: Send + Sync {
  /// Insert `entry` into `processor`'s scope, replacing an entry with the same ID.
  fn add(&self, processor: &str, entry: RegistryEntry);

  /// Remove an entry. Unknown IDs and unknown scopes are ignored.
  fn remove(&self, processor: &str, artifact_id: &str);

  fn find_by_id(&self, processor: &str, artifact_id: &str) -> Option<RegistryEntry>;

  /// All entries of `processor`, ordered by artifact ID.
  fn find_all(&self, processor: &str) -> Vec<RegistryEntry>;

  /// Replace the in-memory state with the persisted one.
  fn load(&self) -> Result<(), RegistryError>;

  /// Persist the in-memory state.
  fn save(&self) -> Result<(), RegistryError>;
}
