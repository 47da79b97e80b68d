//! Ledger-backed registry.
//!
//! Persists the whole registry to a single JSON document.
//!
//! # Ledger Format
//!
//! ```json
//! {
//!   "generatedAt": "2024-05-01T12:00:00Z",
//!   "entries": {
//!     "files": [
//!       { "artifactId": "index", "metadata": { "path": "/srv/index.html", "writePolicy": "recreate" } }
//!     ]
//!   }
//! }
//! ```
//!
//! Older ledgers that name the map `files` are read as well.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::util::{Clock, SystemClock};

use super::ArtifactRegistry;
use super::memory::MemoryRegistry;
use super::types::{RegistryEntry, RegistryError};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerDocument {
  generated_at: DateTime<Utc>,
  #[serde(alias = "files", default)]
  entries: BTreeMap<String, Vec<RegistryEntry>>,
}

/// Registry persisted to a JSON ledger file.
///
/// All queries and mutations go to the wrapped [`MemoryRegistry`]; the file
/// is only touched by [`load`](ArtifactRegistry::load) and
/// [`save`](ArtifactRegistry::save).
pub struct LedgerRegistry {
  path: PathBuf,
  memory: MemoryRegistry,
  clock: Arc<dyn Clock>,
  generated_at: RwLock<Option<DateTime<Utc>>>,
}

impl LedgerRegistry {
  /// Create a registry backed by the ledger at `path`, stamped with wall clock time.
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self::with_clock(path, Arc::new(SystemClock))
  }

  pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
    Self {
      path: path.into(),
      memory: MemoryRegistry::new(),
      clock,
      generated_at: RwLock::new(None),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Generation time of the ledger as last loaded or saved.
  pub fn generated_at(&self) -> Option<DateTime<Utc>> {
    *self.generated_at.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn set_generated_at(&self, value: Option<DateTime<Utc>>) {
    *self.generated_at.write().unwrap_or_else(PoisonError::into_inner) = value;
  }

  fn read_document(&self) -> Result<Option<LedgerDocument>, RegistryError> {
    let content = match fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %self.path.display(), "registry ledger not found");
        return Ok(None);
      }
      Err(source) => {
        return Err(RegistryError::Read {
          path: self.path.clone(),
          source,
        });
      }
    };

    if content.trim().is_empty() {
      debug!(path = %self.path.display(), "registry ledger is empty");
      return Ok(None);
    }

    serde_json::from_str(&content)
      .map(Some)
      .map_err(|source| RegistryError::Parse {
        path: self.path.clone(),
        source,
      })
  }

  /// Write `content` next to the ledger, then rename it into place.
  fn write_atomic(&self, content: &str) -> Result<(), RegistryError> {
    let dir = match self.path.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
      _ => PathBuf::from("."),
    };

    fs::create_dir_all(&dir).map_err(|source| RegistryError::CreateDir {
      path: dir.clone(),
      source,
    })?;

    let write_err = |source: io::Error| RegistryError::Write {
      path: self.path.clone(),
      source,
    };

    let mut temp = NamedTempFile::new_in(&dir).map_err(write_err)?;
    temp.write_all(content.as_bytes()).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;
    temp.persist(&self.path).map_err(|e| write_err(e.error))?;

    Ok(())
  }
}

impl std::fmt::Debug for LedgerRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LedgerRegistry")
      .field("path", &self.path)
      .field("memory", &self.memory)
      .field("generated_at", &self.generated_at())
      .finish_non_exhaustive()
  }
}

impl ArtifactRegistry for LedgerRegistry {
  fn add(&self, processor: &str, entry: RegistryEntry) {
    self.memory.add(processor, entry);
  }

  fn remove(&self, processor: &str, artifact_id: &str) {
    self.memory.remove(processor, artifact_id);
  }

  fn find_by_id(&self, processor: &str, artifact_id: &str) -> Option<RegistryEntry> {
    self.memory.find_by_id(processor, artifact_id)
  }

  fn find_all(&self, processor: &str) -> Vec<RegistryEntry> {
    self.memory.find_all(processor)
  }

  /// Read the ledger. A missing or empty file yields an empty registry.
  fn load(&self) -> Result<(), RegistryError> {
    match self.read_document()? {
      Some(document) => {
        self.memory.replace(document.entries);
        self.set_generated_at(Some(document.generated_at));
      }
      None => {
        self.memory.replace(BTreeMap::new());
        self.set_generated_at(None);
      }
    }

    info!(
      path = %self.path.display(),
      entries = self.memory.len(),
      "registry ledger loaded"
    );
    Ok(())
  }

  /// Stamp the generation time and overwrite the ledger with the full registry.
  fn save(&self) -> Result<(), RegistryError> {
    let document = LedgerDocument {
      generated_at: self.clock.now(),
      entries: self.memory.snapshot(),
    };

    let content = serde_json::to_string_pretty(&document).map_err(RegistryError::Serialize)?;
    self.write_atomic(&content)?;
    self.set_generated_at(Some(document.generated_at));

    info!(
      path = %self.path.display(),
      entries = self.memory.len(),
      "registry ledger saved"
    );
    Ok(())
  }
}
