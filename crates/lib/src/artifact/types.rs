use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a processor treats an artifact that may already exist on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WritePolicy {
  /// Removed and rewritten on every run, tracked in the registry.
  Recreate,
  /// Written only if absent, never tracked.
  WriteOnce,
}

impl WritePolicy {
  pub fn as_str(&self) -> &'static str {
    match self {
      WritePolicy::Recreate => "recreate",
      WritePolicy::WriteOnce => "write-once",
    }
  }
}

impl fmt::Display for WritePolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for WritePolicy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "recreate" => Ok(WritePolicy::Recreate),
      "write-once" => Ok(WritePolicy::WriteOnce),
      other => Err(format!("unknown write policy: {other}")),
    }
  }
}

/// A generated output to be materialized by an artifact processor.
pub trait Artifact: fmt::Debug + Send + Sync + 'static {
  /// Stable identifier, used as the registry key.
  fn id(&self) -> &str;

  fn as_any(&self) -> &dyn Any;
}

impl dyn Artifact {
  /// Returns the concrete artifact if it is a `T`.
  pub fn downcast_ref<T: Artifact>(&self) -> Option<&T> {
    self.as_any().downcast_ref::<T>()
  }
}

/// A file with a byte payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArtifact {
  pub id: String,
  pub path: PathBuf,
  pub data: Vec<u8>,
  /// Unset means [`WritePolicy::WriteOnce`].
  pub write_policy: Option<WritePolicy>,
}

impl FileArtifact {
  pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) -> Self {
    Self {
      id: id.into(),
      path: path.into(),
      data: data.into(),
      write_policy: None,
    }
  }

  pub fn with_policy(mut self, policy: WritePolicy) -> Self {
    self.write_policy = Some(policy);
    self
  }
}

impl Artifact for FileArtifact {
  fn id(&self) -> &str {
    &self.id
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}

/// A directory, created with `create_dir_all` semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryArtifact {
  pub id: String,
  pub path: PathBuf,
  /// Unset means [`WritePolicy::WriteOnce`].
  pub write_policy: Option<WritePolicy>,
}

impl DirectoryArtifact {
  pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
    Self {
      id: id.into(),
      path: path.into(),
      write_policy: None,
    }
  }

  pub fn with_policy(mut self, policy: WritePolicy) -> Self {
    self.write_policy = Some(policy);
    self
  }
}

impl Artifact for DirectoryArtifact {
  fn id(&self) -> &str {
    &self.id
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}
