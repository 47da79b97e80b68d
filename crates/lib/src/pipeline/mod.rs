//! Pipeline orchestration.
//!
//! A run goes through these stages, in order:
//!
//! 1. **Load sources**: every location is handed to the first [`SourceLoader`] that supports it
//! 2. **Load units**: every source is parsed by the first [`UnitLoader`] that supports it
//! 3. **Resolve**: units are ordered so that each follows its dependencies
//! 4. **Generate**: [`Generator`]s turn the ordered units into artifacts
//! 5. **Process**: [`ArtifactProcessor`]s materialize the artifacts (skipped in preview mode)
//!
//! Per-item failures in the loading stages are recorded as warnings as long as
//! at least one item succeeds. Everything else aborts the run.
//!
//! The registry is loaded once before the first processor and saved once after
//! the last one, whether the processors succeeded or not.

mod config;
mod types;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn};

use crate::artifact::Artifact;
use crate::processor::{ArtifactProcessor, DirectoryProcessor, FileProcessor, ProcessContext};
use crate::registry::{ArtifactRegistry, LedgerRegistry, MemoryRegistry, ProcessorRegistry};
use crate::resolve::{DependencyGraph, DependencyProvider};
use crate::unit::{Source, SourceDescriptor, Unit};
use crate::util::{Clock, SystemClock};

pub use config::{ConfigError, PipelineConfig, RunMode};
pub use types::{
  Generator, PipelineError, PipelineWarning, RunReport, RunResult, SourceLoader, Stage, UnitLoader,
};

/// A configured pipeline. Reusable across runs.
pub struct Pipeline {
  config: PipelineConfig,
  source_loaders: Vec<Arc<dyn SourceLoader>>,
  unit_loaders: Vec<Arc<dyn UnitLoader>>,
  providers: Vec<Arc<dyn DependencyProvider>>,
  generators: Vec<Arc<dyn Generator>>,
  processors: Vec<Arc<dyn ArtifactProcessor>>,
  registry: Arc<dyn ArtifactRegistry>,
  clock: Arc<dyn Clock>,
}

impl Pipeline {
  /// Create a pipeline with no plug-ins.
  ///
  /// The registry is a [`LedgerRegistry`] when `config.registry_path` is set
  /// and a [`MemoryRegistry`] otherwise.
  pub fn new(config: PipelineConfig) -> Self {
    let registry: Arc<dyn ArtifactRegistry> = match &config.registry_path {
      Some(path) => Arc::new(LedgerRegistry::new(path)),
      None => Arc::new(MemoryRegistry::new()),
    };

    Self {
      config,
      source_loaders: Vec::new(),
      unit_loaders: Vec::new(),
      providers: Vec::new(),
      generators: Vec::new(),
      processors: Vec::new(),
      registry,
      clock: Arc::new(SystemClock),
    }
  }

  pub fn with_source_loader(mut self, loader: impl SourceLoader + 'static) -> Self {
    self.source_loaders.push(Arc::new(loader));
    self
  }

  pub fn with_unit_loader(mut self, loader: impl UnitLoader + 'static) -> Self {
    self.unit_loaders.push(Arc::new(loader));
    self
  }

  pub fn with_provider(mut self, provider: impl DependencyProvider + 'static) -> Self {
    self.providers.push(Arc::new(provider));
    self
  }

  pub fn with_generator(mut self, generator: impl Generator + 'static) -> Self {
    self.generators.push(Arc::new(generator));
    self
  }

  pub fn with_processor(mut self, processor: impl ArtifactProcessor + 'static) -> Self {
    self.processors.push(Arc::new(processor));
    self
  }

  /// Register a [`FileProcessor`] and a [`DirectoryProcessor`] under their default names.
  pub fn with_default_processors(self) -> Self {
    self
      .with_processor(DirectoryProcessor::new())
      .with_processor(FileProcessor::new())
  }

  /// Replace the registry chosen from the configuration.
  pub fn with_registry(mut self, registry: Arc<dyn ArtifactRegistry>) -> Self {
    self.registry = registry;
    self
  }

  /// Time source for the run report.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  pub fn registry(&self) -> &Arc<dyn ArtifactRegistry> {
    &self.registry
  }

  /// Run every stage over `locations`.
  ///
  /// Never panics on plug-in errors; the outcome and a report of what was
  /// done are always returned.
  pub async fn run(&self, locations: &[SourceDescriptor], cancel: CancellationToken) -> RunResult {
    let mode = match self.config.mode {
      Some(mode) => mode,
      None => {
        warn!("no run mode configured, defaulting to preview");
        RunMode::Preview
      }
    };

    let mut report = RunReport::new(self.clock.now(), mode, locations.len());
    info!(mode = %mode, locations = locations.len(), "starting pipeline run");

    let outcome = self.run_stages(locations, mode, &cancel, &mut report).await;
    report.finished_at = self.clock.now();

    match &outcome {
      Ok(()) => info!(
        mode = %mode,
        sources = report.source_count,
        units = report.unit_count,
        artifacts = report.artifact_count,
        warnings = report.warnings.len(),
        "pipeline run complete"
      ),
      Err(e) => error!(code = e.code(), error = %e, "pipeline run failed"),
    }

    RunResult { report, outcome }
  }

  async fn run_stages(
    &self,
    locations: &[SourceDescriptor],
    mode: RunMode,
    cancel: &CancellationToken,
    report: &mut RunReport,
  ) -> Result<(), PipelineError> {
    check_cancelled(cancel, Stage::LoadSources)?;

    let sources = self.load_sources(locations, report)?;
    report.source_count = sources.len();
    check_cancelled(cancel, Stage::LoadUnits)?;

    let units = self.load_units(sources, report)?;
    report.unit_count = units.len();
    check_cancelled(cancel, Stage::Resolve)?;

    let ordered = DependencyGraph::build(&units, &self.providers)?.resolve()?;
    debug!(units = ordered.len(), "units resolved");
    check_cancelled(cancel, Stage::Generate)?;

    let artifacts = self.generate(&ordered)?;
    report.artifact_count = artifacts.len();

    if mode == RunMode::Preview {
      info!(artifacts = artifacts.len(), "preview mode, skipping artifact processors");
      return Ok(());
    }
    check_cancelled(cancel, Stage::Process)?;

    self.process(&artifacts, cancel, report).await
  }

  fn load_sources(
    &self,
    locations: &[SourceDescriptor],
    report: &mut RunReport,
  ) -> Result<Vec<Arc<Source>>, PipelineError> {
    let mut sources = Vec::new();
    let mut succeeded = 0;
    let mut failures = Vec::new();

    for location in locations {
      let Some(loader) = self.source_loaders.iter().find(|l| l.supports(location)) else {
        warn!(location = %location, "no source loader supports location");
        report
          .warnings
          .push(PipelineWarning::UnsupportedSource(location.clone()));
        continue;
      };

      match loader.load(location) {
        Ok(loaded) => {
          debug!(location = %location, sources = loaded.len(), "sources loaded");
          succeeded += 1;
          sources.extend(loaded.into_iter().map(Arc::new));
        }
        Err(e) => {
          warn!(location = %location, error = %format!("{e:#}"), "failed to load sources");
          failures.push((location.clone(), e));
        }
      }
    }

    settle_stage(Stage::LoadSources, succeeded, failures, report, |location, source| {
      PipelineWarning::SourceLoadFailed { location, source }
    })?;

    if sources.is_empty() && self.config.require_sources {
      return Err(PipelineError::NoSources);
    }

    Ok(sources)
  }

  fn load_units(&self, sources: Vec<Arc<Source>>, report: &mut RunReport) -> Result<Vec<Arc<dyn Unit>>, PipelineError> {
    let mut units = Vec::new();
    let mut succeeded = 0;
    let mut failures = Vec::new();

    for source in sources {
      let Some(loader) = self.unit_loaders.iter().find(|l| l.supports(&source)) else {
        warn!(location = %source.location(), format = source.format(), "no unit loader supports source");
        report.warnings.push(PipelineWarning::UnsupportedFormat {
          location: source.location().clone(),
          format: source.format().to_string(),
        });
        continue;
      };

      let location = source.location().clone();
      match loader.load(source) {
        Ok(loaded) => {
          debug!(location = %location, units = loaded.len(), "units loaded");
          succeeded += 1;
          units.extend(loaded);
        }
        Err(e) => {
          warn!(location = %location, error = %format!("{e:#}"), "failed to load units");
          failures.push((location, e));
        }
      }
    }

    settle_stage(Stage::LoadUnits, succeeded, failures, report, |location, source| {
      PipelineWarning::UnitLoadFailed { location, source }
    })?;

    Ok(units)
  }

  fn generate(&self, units: &[Arc<dyn Unit>]) -> Result<Vec<Arc<dyn Artifact>>, PipelineError> {
    let mut artifacts = Vec::new();

    for generator in &self.generators {
      let _span = info_span!("generator", name = generator.name()).entered();
      let generated = generator
        .generate(units)
        .map_err(|source| PipelineError::GeneratorFailed {
          generator: generator.name().to_string(),
          source,
        })?;
      debug!(artifacts = generated.len(), "generator finished");
      artifacts.extend(generated);
    }

    Ok(artifacts)
  }

  /// Run every processor against the registry, then save it once.
  async fn process(
    &self,
    artifacts: &[Arc<dyn Artifact>],
    cancel: &CancellationToken,
    report: &mut RunReport,
  ) -> Result<(), PipelineError> {
    self.registry.load()?;

    let mut errors = Vec::new();
    for processor in &self.processors {
      let ctx = ProcessContext {
        registry: ProcessorRegistry::new(self.registry.clone(), processor.name()),
        cancel: cancel.clone(),
        parallelism: self.config.parallelism,
      };

      match processor.process(artifacts, &ctx).await {
        Ok(summary) => {
          info!(
            processor = processor.name(),
            removed = summary.removed,
            written = summary.written,
            skipped = summary.skipped,
            "processor finished"
          );
          report.processed.insert(processor.name().to_string(), summary);
        }
        Err(e) => {
          error!(processor = processor.name(), code = e.code(), error = %e, "processor failed");
          errors.push(e);
        }
      }
    }

    let saved = self.registry.save();

    if !errors.is_empty() {
      if let Err(e) = saved {
        error!(error = %e, "failed to save registry after processor failure");
      }
      return Err(PipelineError::Processing(errors));
    }

    saved.map_err(PipelineError::from)
  }
}

impl std::fmt::Debug for Pipeline {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Pipeline")
      .field("config", &self.config)
      .field("source_loaders", &self.source_loaders.len())
      .field("unit_loaders", &self.unit_loaders.len())
      .field("providers", &self.providers.len())
      .field("generators", &self.generators.len())
      .field("processors", &self.processors.len())
      .finish_non_exhaustive()
  }
}

/// Keep per-item failures as warnings, or fail the stage when nothing succeeded.
fn settle_stage(
  stage: Stage,
  succeeded: usize,
  mut failures: Vec<(SourceDescriptor, anyhow::Error)>,
  report: &mut RunReport,
  warning: fn(SourceDescriptor, anyhow::Error) -> PipelineWarning,
) -> Result<(), PipelineError> {
  if succeeded == 0
    && let Some((_, source)) = failures.pop()
  {
    return Err(PipelineError::LoadFailed {
      stage,
      count: failures.len() + 1,
      source,
    });
  }

  report
    .warnings
    .extend(failures.into_iter().map(|(location, source)| warning(location, source)));
  Ok(())
}

fn check_cancelled(cancel: &CancellationToken, stage: Stage) -> Result<(), PipelineError> {
  if cancel.is_cancelled() {
    warn!(stage = %stage, "run cancelled");
    return Err(PipelineError::Cancelled(stage));
  }
  Ok(())
}
