//! Types for artifact processing.
//!
//! Defines the per-artifact error, the aggregated processor error and the
//! context and summary passed in and out of a processor run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::registry::ProcessorRegistry;

/// Why a single artifact or registry entry could not be handled.
#[derive(Debug, Error)]
pub enum ArtifactError {
  /// Registry entry has no usable target path.
  #[error("registry entry has no target path")]
  MissingPath,

  /// Registry entry carries no recognized write policy.
  #[error("registry entry has an unrecognized write policy: {0:?}")]
  InvalidPolicy(Option<String>),

  /// Artifact was emitted with an empty target path.
  #[error("artifact has an empty target path")]
  EmptyPath,

  /// The same artifact ID was emitted more than once for one processor.
  #[error("artifact ID emitted more than once")]
  DuplicateId,

  /// A recreated artifact is still on disk although clean-up should have removed it.
  #[error("{} still exists after clean-up", .0.display())]
  StillPresent(PathBuf),

  #[error("failed to resolve {}: {source}", path.display())]
  ResolvePath {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to inspect {}: {source}", path.display())]
  Probe {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write {}: {source}", path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// Physical removal failed; the registry entry has been restored.
  #[error("failed to remove {}: {source}", path.display())]
  Remove {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The worker task died before reporting.
  #[error("worker task failed: {0}")]
  Worker(String),
}

/// An [`ArtifactError`] tagged with the artifact it concerns.
#[derive(Debug, Error)]
#[error("{artifact_id}: {source}")]
pub struct ArtifactFailure {
  pub artifact_id: String,
  #[source]
  pub source: ArtifactError,
}

impl ArtifactFailure {
  pub fn new(artifact_id: impl Into<String>, source: ArtifactError) -> Self {
    Self {
      artifact_id: artifact_id.into(),
      source,
    }
  }
}

fn describe(failures: &[ArtifactFailure]) -> String {
  failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Errors reported by an artifact processor.
///
/// Failures of concurrent workers are collected into one value; the stage is
/// only reported after every worker has finished.
#[derive(Debug, Error)]
pub enum ProcessError {
  /// The registry was corrupted or a tracked artifact could not be removed.
  #[error("{processor}: clean-up failed for {} artifact(s): {}", failures.len(), describe(failures))]
  CleanUpFailed {
    processor: String,
    failures: Vec<ArtifactFailure>,
  },

  /// An artifact was malformed or could not be written.
  #[error("{processor}: processing failed for {} artifact(s): {}", failures.len(), describe(failures))]
  ProcessingFailed {
    processor: String,
    failures: Vec<ArtifactFailure>,
  },

  /// The run was cancelled before the processor finished.
  #[error("{processor}: cancelled")]
  Cancelled { processor: String },
}

impl ProcessError {
  /// Stable machine readable code.
  pub fn code(&self) -> &'static str {
    match self {
      ProcessError::CleanUpFailed { .. } => "clean-up-failed",
      ProcessError::ProcessingFailed { .. } => "processing-failed",
      ProcessError::Cancelled { .. } => "cancelled",
    }
  }

  pub fn processor(&self) -> &str {
    match self {
      ProcessError::CleanUpFailed { processor, .. }
      | ProcessError::ProcessingFailed { processor, .. }
      | ProcessError::Cancelled { processor } => processor,
    }
  }

  pub fn failures(&self) -> &[ArtifactFailure] {
    match self {
      ProcessError::CleanUpFailed { failures, .. } | ProcessError::ProcessingFailed { failures, .. } => failures,
      ProcessError::Cancelled { .. } => &[],
    }
  }
}

/// Everything a processor needs from the pipeline for one run.
#[derive(Debug, Clone)]
pub struct ProcessContext {
  /// Registry bound to the processor's own scope.
  pub registry: ProcessorRegistry,

  pub cancel: CancellationToken,

  /// Maximum number of concurrent workers.
  pub parallelism: usize,
}

/// Counts reported by a successful processor run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSummary {
  /// Recreated artifacts removed during clean-up.
  pub removed: usize,

  /// Artifacts written this run.
  pub written: usize,

  /// Write-once artifacts left alone because they already existed.
  pub skipped: usize,

  /// Artifacts of a type this processor does not handle.
  pub ignored: usize,
}
