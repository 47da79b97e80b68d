//! Registry entry and error types.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Arbitrary metadata attached to a registry entry.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A tracked artifact within one processor's scope.
///
/// # Example
///
/// ```json
/// {
///   "artifactId": "site/index.html",
///   "metadata": { "path": "/srv/site/index.html", "writePolicy": "recreate" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
  pub artifact_id: String,
  pub metadata: Option<Metadata>,
}

impl RegistryEntry {
  pub fn new(artifact_id: impl Into<String>, metadata: Option<Metadata>) -> Self {
    Self {
      artifact_id: artifact_id.into(),
      metadata,
    }
  }

  /// String value stored under `key`, if any.
  pub fn metadata_str(&self, key: &str) -> Option<&str> {
    self.metadata.as_ref()?.get(key)?.as_str()
  }
}

/// Errors that can occur when loading or saving the ledger.
#[derive(Debug, Error)]
pub enum RegistryError {
  /// Failed to read the ledger file.
  #[error("failed to read registry ledger {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// Failed to write the ledger file.
  #[error("failed to write registry ledger {}: {source}", path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// Failed to create the directory holding the ledger.
  #[error("failed to create registry directory {}: {source}", path.display())]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The ledger file is not a valid ledger document.
  #[error("failed to parse registry ledger {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  /// Failed to serialize the ledger.
  #[error("failed to serialize registry ledger: {0}")]
  Serialize(#[source] serde_json::Error),
}
