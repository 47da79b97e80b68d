//! Artifact processors.
//!
//! A processor materializes one family of artifacts and tracks the ones it
//! must recreate on the next run through its own registry scope.

mod dir;
mod engine;
mod file;
mod types;

use std::sync::Arc;

use async_trait::async_trait;

use crate::artifact::Artifact;

pub use dir::DirectoryProcessor;
pub use file::FileProcessor;
pub use types::{ArtifactError, ArtifactFailure, ProcessContext, ProcessError, ProcessSummary};

/// Materializes the artifacts it recognizes and ignores the rest.
#[async_trait]
pub trait ArtifactProcessor: Send + Sync {
  /// Registry scope and log label for this processor.
  fn name(&self) -> &str;

  /// Clean up what the previous run left, then write `artifacts`.
  async fn process(
    &self,
    artifacts: &[Arc<dyn Artifact>],
    ctx: &ProcessContext,
  ) -> Result<ProcessSummary, ProcessError>;
}
