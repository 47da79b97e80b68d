//! Plug-in traits, errors and results of a pipeline run.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::artifact::Artifact;
use crate::processor::{ProcessError, ProcessSummary};
use crate::registry::RegistryError;
use crate::resolve::ResolveError;
use crate::unit::{Source, SourceDescriptor, Unit};

use super::config::RunMode;

/// Reads raw sources from a location.
pub trait SourceLoader: Send + Sync {
  fn supports(&self, location: &SourceDescriptor) -> bool;

  /// Read every source found at `location`.
  fn load(&self, location: &SourceDescriptor) -> anyhow::Result<Vec<Source>>;
}

/// Parses units out of a source.
pub trait UnitLoader: Send + Sync {
  fn supports(&self, source: &Source) -> bool;

  fn load(&self, source: Arc<Source>) -> anyhow::Result<Vec<Arc<dyn Unit>>>;
}

/// Turns resolved units into artifacts.
pub trait Generator: Send + Sync {
  fn name(&self) -> &str;

  /// `units` are in dependency order: every unit follows its dependencies.
  fn generate(&self, units: &[Arc<dyn Unit>]) -> anyhow::Result<Vec<Arc<dyn Artifact>>>;
}

/// A per-item problem that did not stop the run.
#[derive(Debug, Error)]
pub enum PipelineWarning {
  /// No source loader claims the location.
  #[error("no source loader supports '{0}'")]
  UnsupportedSource(SourceDescriptor),

  /// No unit loader understands the source.
  #[error("no unit loader supports '{location}' (format '{format}')")]
  UnsupportedFormat { location: SourceDescriptor, format: String },

  #[error("failed to load sources from '{location}': {source:#}")]
  SourceLoadFailed {
    location: SourceDescriptor,
    #[source]
    source: anyhow::Error,
  },

  #[error("failed to load units from '{location}': {source:#}")]
  UnitLoadFailed {
    location: SourceDescriptor,
    #[source]
    source: anyhow::Error,
  },
}

impl PipelineWarning {
  pub fn code(&self) -> &'static str {
    match self {
      PipelineWarning::UnsupportedSource(_) | PipelineWarning::UnsupportedFormat { .. } => "unsupported-source",
      PipelineWarning::SourceLoadFailed { .. } | PipelineWarning::UnitLoadFailed { .. } => "load-failed",
    }
  }
}

/// Stage of a run, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  LoadSources,
  LoadUnits,
  Resolve,
  Generate,
  Process,
}

impl std::fmt::Display for Stage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Stage::LoadSources => "load-sources",
      Stage::LoadUnits => "load-units",
      Stage::Resolve => "resolve",
      Stage::Generate => "generate",
      Stage::Process => "process",
    };
    f.write_str(name)
  }
}

/// A failure that aborted the run.
#[derive(Debug, Error)]
pub enum PipelineError {
  /// No sources were loaded and the configuration requires some.
  #[error("no sources were loaded")]
  NoSources,

  /// Every item of a loading stage failed.
  #[error("{stage}: all {count} item(s) failed, last error: {source:#}")]
  LoadFailed {
    stage: Stage,
    count: usize,
    #[source]
    source: anyhow::Error,
  },

  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error("generator '{generator}' failed: {source:#}")]
  GeneratorFailed {
    generator: String,
    #[source]
    source: anyhow::Error,
  },

  /// One or more artifact processors failed.
  #[error("{}", describe(.0))]
  Processing(Vec<ProcessError>),

  #[error("registry failure: {0}")]
  Registry(#[from] RegistryError),

  #[error("run cancelled during {0}")]
  Cancelled(Stage),
}

fn describe(errors: &[ProcessError]) -> String {
  errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
}

impl PipelineError {
  /// Stable machine readable code.
  ///
  /// When several processors failed, the code of the first failure is used.
  pub fn code(&self) -> &'static str {
    match self {
      PipelineError::NoSources => "no-sources",
      PipelineError::LoadFailed { .. } => "load-failed",
      PipelineError::Resolve(ResolveError::Unresolved { .. }) => "unresolved-dependency",
      PipelineError::Resolve(ResolveError::Circular { .. }) => "circular-dependency",
      PipelineError::Resolve(ResolveError::DuplicateUnit(_)) => "duplicate-unit",
      PipelineError::GeneratorFailed { .. } => "generator-failed",
      PipelineError::Processing(errors) => errors.first().map_or("processing-failed", ProcessError::code),
      PipelineError::Registry(_) => "registry-failed",
      PipelineError::Cancelled(_) => "cancelled",
    }
  }
}

/// What a run did, reported whether it succeeded or not.
#[derive(Debug)]
pub struct RunReport {
  pub started_at: DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  pub mode: RunMode,
  pub location_count: usize,
  pub source_count: usize,
  pub unit_count: usize,
  pub artifact_count: usize,
  pub warnings: Vec<PipelineWarning>,
  /// Summaries of the processors that completed, by processor name.
  pub processed: BTreeMap<String, ProcessSummary>,
}

impl RunReport {
  pub(crate) fn new(started_at: DateTime<Utc>, mode: RunMode, location_count: usize) -> Self {
    Self {
      started_at,
      finished_at: started_at,
      mode,
      location_count,
      source_count: 0,
      unit_count: 0,
      artifact_count: 0,
      warnings: Vec::new(),
      processed: BTreeMap::new(),
    }
  }
}

/// Report and outcome of a run.
#[derive(Debug)]
pub struct RunResult {
  pub report: RunReport,
  pub outcome: Result<(), PipelineError>,
}

impl RunResult {
  pub fn is_success(&self) -> bool {
    self.outcome.is_ok()
  }

  /// The report on success, the error otherwise.
  pub fn into_result(self) -> Result<RunReport, PipelineError> {
    self.outcome.map(|()| self.report)
  }
}
