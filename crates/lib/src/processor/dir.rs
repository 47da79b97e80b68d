use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::artifact::{Artifact, DirectoryArtifact};

use super::engine::{self, Payload, TargetKind, WriteJob};
use super::{ArtifactProcessor, ProcessContext, ProcessError, ProcessSummary};

/// Creates [`DirectoryArtifact`]s. Recreated directories are removed with
/// their contents before the write phase.
#[derive(Debug, Clone)]
pub struct DirectoryProcessor {
  name: String,
}

impl DirectoryProcessor {
  pub const DEFAULT_NAME: &'static str = "directories";

  pub fn new() -> Self {
    Self::named(Self::DEFAULT_NAME)
  }

  pub fn named(name: impl Into<String>) -> Self {
    Self { name: name.into() }
  }
}

impl Default for DirectoryProcessor {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl ArtifactProcessor for DirectoryProcessor {
  fn name(&self) -> &str {
    &self.name
  }

  async fn process(
    &self,
    artifacts: &[Arc<dyn Artifact>],
    ctx: &ProcessContext,
  ) -> Result<ProcessSummary, ProcessError> {
    let jobs: Vec<WriteJob> = artifacts
      .iter()
      .filter_map(|artifact| artifact.downcast_ref::<DirectoryArtifact>())
      .map(|dir| WriteJob {
        id: dir.id.clone(),
        path: dir.path.clone(),
        policy: dir.write_policy,
        payload: Payload::Directory,
      })
      .collect();

    let ignored = artifacts.len() - jobs.len();
    debug!(processor = %self.name, directories = jobs.len(), ignored, "processing directory artifacts");

    let summary = engine::run(&self.name, TargetKind::Directory, jobs, ctx).await?;
    Ok(ProcessSummary { ignored, ..summary })
  }
}
