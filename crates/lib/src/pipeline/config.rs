//! Pipeline configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{ENV_MODE, ENV_PARALLELISM, ENV_REGISTRY, LEDGER_FILENAME};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("invalid run mode '{0}', expected 'preview' or 'run-through'")]
  InvalidMode(String),

  #[error("invalid parallelism '{0}', expected a positive integer")]
  InvalidParallelism(String),
}

/// How far a run goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
  /// Stop after the generators; nothing is written.
  Preview,
  /// Run the artifact processors as well.
  RunThrough,
}

impl RunMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      RunMode::Preview => "preview",
      RunMode::RunThrough => "run-through",
    }
  }
}

impl fmt::Display for RunMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for RunMode {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim() {
      "preview" => Ok(RunMode::Preview),
      "run-through" => Ok(RunMode::RunThrough),
      other => Err(ConfigError::InvalidMode(other.to_string())),
    }
  }
}

/// Configuration for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
  /// Run mode. Unset runs as [`RunMode::Preview`] and logs a warning.
  pub mode: Option<RunMode>,

  /// Maximum number of concurrent per-artifact workers.
  pub parallelism: usize,

  /// Location of the registry ledger. Unset keeps the registry in memory.
  pub registry_path: Option<PathBuf>,

  /// Whether a run that loads no sources at all fails.
  pub require_sources: bool,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      mode: None,
      parallelism: num_cpus(),
      registry_path: None,
      require_sources: false,
    }
  }
}

impl PipelineConfig {
  /// Default configuration overlaid with `UNITFORGE_*` environment variables.
  ///
  /// Empty variables are treated as unset.
  pub fn from_env() -> Result<Self, ConfigError> {
    let mut config = Self::default();

    if let Some(raw) = env_var(ENV_MODE) {
      config.mode = Some(raw.parse()?);
    }

    if let Some(raw) = env_var(ENV_PARALLELISM) {
      config.parallelism = match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => return Err(ConfigError::InvalidParallelism(raw)),
      };
    }

    if let Some(raw) = env_var(ENV_REGISTRY) {
      config.registry_path = Some(PathBuf::from(raw));
    }

    debug!(?config, "pipeline configuration from environment");
    Ok(config)
  }

  pub fn with_mode(mut self, mode: RunMode) -> Self {
    self.mode = Some(mode);
    self
  }

  pub fn with_parallelism(mut self, parallelism: usize) -> Self {
    self.parallelism = parallelism;
    self
  }

  pub fn with_registry_path(mut self, path: impl Into<PathBuf>) -> Self {
    self.registry_path = Some(path.into());
    self
  }

  /// Keep the ledger as `registry.json` inside `dir`.
  pub fn with_registry_dir(self, dir: impl AsRef<Path>) -> Self {
    self.with_registry_path(dir.as_ref().join(LEDGER_FILENAME))
  }

  pub fn with_require_sources(mut self, require: bool) -> Self {
    self.require_sources = require;
    self
  }

  /// The mode the run will use.
  pub fn effective_mode(&self) -> RunMode {
    self.mode.unwrap_or(RunMode::Preview)
  }
}

fn env_var(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
