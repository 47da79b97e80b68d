use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::artifact::{Artifact, FileArtifact};

use super::engine::{self, Payload, TargetKind, WriteJob};
use super::{ArtifactProcessor, ProcessContext, ProcessError, ProcessSummary};

/// Writes [`FileArtifact`]s.
#[derive(Debug, Clone)]
pub struct FileProcessor {
  name: String,
}

impl FileProcessor {
  pub const DEFAULT_NAME: &'static str = "files";

  pub fn new() -> Self {
    Self::named(Self::DEFAULT_NAME)
  }

  /// A file processor with its own registry scope.
  pub fn named(name: impl Into<String>) -> Self {
    Self { name: name.into() }
  }
}

impl Default for FileProcessor {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl ArtifactProcessor for FileProcessor {
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
      .filter_map(|artifact| artifact.downcast_ref::<FileArtifact>())
      .map(|file| WriteJob {
        id: file.id.clone(),
        path: file.path.clone(),
        policy: file.write_policy,
        payload: Payload::File(file.data.clone()),
      })
      .collect();

    let ignored = artifacts.len() - jobs.len();
    debug!(processor = %self.name, files = jobs.len(), ignored, "processing file artifacts");

    let summary = engine::run(&self.name, TargetKind::File, jobs, ctx).await?;
    Ok(ProcessSummary { ignored, ..summary })
  }
}
