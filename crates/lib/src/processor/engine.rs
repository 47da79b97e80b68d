//! Clean and write phases shared by the file and directory processors.
//!
//! A processor run is:
//!
//! 1. Clean: remove every artifact the registry tracks as `recreate`
//! 2. Ensure: bail out if the run was cancelled
//! 3. Write: materialize this run's artifacts, tracking the `recreate` ones
//!
//! Both the clean and the write phase fan out into one blocking worker per
//! item and only report once every worker has finished.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::artifact::WritePolicy;
use crate::consts::{APP_NAME, META_PATH, META_WRITE_POLICY};
use crate::registry::{Metadata, ProcessorRegistry, RegistryEntry};

use super::types::{ArtifactError, ArtifactFailure, ProcessContext, ProcessError, ProcessSummary};

/// What kind of file system object a processor materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TargetKind {
  File,
  Directory,
}

/// Content to write for one artifact.
#[derive(Debug, Clone)]
pub(crate) enum Payload {
  File(Vec<u8>),
  Directory,
}

impl Payload {
  fn kind(&self) -> TargetKind {
    match self {
      Payload::File(_) => TargetKind::File,
      Payload::Directory => TargetKind::Directory,
    }
  }
}

/// One artifact, reduced to what the write phase needs.
#[derive(Debug, Clone)]
pub(crate) struct WriteJob {
  pub id: String,
  pub path: PathBuf,
  pub policy: Option<WritePolicy>,
  pub payload: Payload,
}

/// A registry entry that passed validation.
#[derive(Debug, Clone)]
struct Tracked {
  entry: RegistryEntry,
  path: PathBuf,
  policy: WritePolicy,
}

impl Tracked {
  fn from_entry(entry: RegistryEntry) -> Result<Self, ArtifactFailure> {
    let fail = |source| ArtifactFailure::new(entry.artifact_id.clone(), source);

    let path = match entry.metadata_str(META_PATH) {
      Some(path) if !path.is_empty() => PathBuf::from(path),
      _ => return Err(fail(ArtifactError::MissingPath)),
    };

    let raw_policy = entry.metadata_str(META_WRITE_POLICY);
    let policy = raw_policy
      .and_then(|raw| raw.parse::<WritePolicy>().ok())
      .ok_or_else(|| fail(ArtifactError::InvalidPolicy(raw_policy.map(str::to_string))))?;

    Ok(Self { entry, path, policy })
  }
}

/// Result of the remove-then-delete sequence for one tracked artifact.
///
/// The registry entry is dropped first and the file system object second. If
/// the second step fails the entry is put back, so the ledger never forgets
/// something that is still on disk.
#[derive(Debug)]
enum Removal {
  /// Entry dropped and object removed.
  Removed,
  /// Entry dropped; the object was already gone.
  AlreadyGone,
  /// Removal failed and the entry was restored.
  Restored { entry: RegistryEntry, error: io::Error },
}

/// What the write phase did with one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Written {
  Created,
  Skipped,
}

/// Run the clean, ensure and write phases for one processor.
pub(crate) async fn run(
  processor: &str,
  kind: TargetKind,
  jobs: Vec<WriteJob>,
  ctx: &ProcessContext,
) -> Result<ProcessSummary, ProcessError> {
  let removed = clean(processor, kind, ctx).await?;

  if ctx.cancel.is_cancelled() {
    warn!(processor, "cancelled before writing artifacts");
    return Err(ProcessError::Cancelled {
      processor: processor.to_string(),
    });
  }

  let (written, skipped) = write_all(processor, jobs, ctx).await?;

  Ok(ProcessSummary {
    removed,
    written,
    skipped,
    ignored: 0,
  })
}

/// Remove every `recreate` artifact tracked for this processor.
///
/// Returns the number of entries dropped from the registry.
async fn clean(processor: &str, kind: TargetKind, ctx: &ProcessContext) -> Result<usize, ProcessError> {
  let entries = ctx.registry.find_all();
  debug!(processor, entries = entries.len(), "starting clean phase");

  let mut candidates = Vec::new();
  let mut invalid = Vec::new();

  for entry in entries {
    match Tracked::from_entry(entry) {
      Ok(tracked) if tracked.policy == WritePolicy::Recreate => candidates.push(tracked),
      Ok(tracked) => debug!(processor, artifact = %tracked.entry.artifact_id, "keeping write-once artifact"),
      Err(failure) => invalid.push(failure),
    }
  }

  // A corrupted registry must not drive a best-effort removal.
  if !invalid.is_empty() {
    error!(processor, invalid = invalid.len(), "registry contains invalid entries");
    return Err(ProcessError::CleanUpFailed {
      processor: processor.to_string(),
      failures: invalid,
    });
  }

  if ctx.cancel.is_cancelled() {
    return Err(ProcessError::Cancelled {
      processor: processor.to_string(),
    });
  }

  let semaphore = Arc::new(Semaphore::new(worker_limit(ctx.parallelism)));
  let mut join_set = JoinSet::new();
  let mut cancelled = false;

  for tracked in candidates {
    if ctx.cancel.is_cancelled() {
      cancelled = true;
      break;
    }

    let Ok(permit) = semaphore.clone().acquire_owned().await else {
      break;
    };
    let registry = ctx.registry.clone();

    join_set.spawn_blocking(move || {
      let _permit = permit;
      let id = tracked.entry.artifact_id.clone();
      (id, remove_tracked(kind, &registry, tracked))
    });
  }

  let mut removed = 0;
  let mut failures = Vec::new();

  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok((id, Removal::Removed)) => {
        debug!(processor, artifact = %id, "removed artifact");
        removed += 1;
      }
      Ok((id, Removal::AlreadyGone)) => {
        debug!(processor, artifact = %id, "artifact already gone");
        removed += 1;
      }
      Ok((id, Removal::Restored { entry, error })) => {
        let path = entry.metadata_str(META_PATH).map(PathBuf::from).unwrap_or_default();
        error!(processor, artifact = %id, error = %error, "removal failed, registry entry restored");
        failures.push(ArtifactFailure::new(id, ArtifactError::Remove { path, source: error }));
      }
      Err(e) => {
        error!(processor, error = %e, "clean-up task panicked");
        failures.push(ArtifactFailure::new("<unknown>", ArtifactError::Worker(e.to_string())));
      }
    }
  }

  if !failures.is_empty() {
    return Err(ProcessError::CleanUpFailed {
      processor: processor.to_string(),
      failures,
    });
  }

  if cancelled {
    return Err(ProcessError::Cancelled {
      processor: processor.to_string(),
    });
  }

  info!(processor, removed, "clean phase complete");
  Ok(removed)
}

/// Drop the registry entry, remove the object, restore the entry on failure.
fn remove_tracked(kind: TargetKind, registry: &ProcessorRegistry, tracked: Tracked) -> Removal {
  let Tracked { entry, path, .. } = tracked;

  registry.remove(&entry.artifact_id);

  match remove_path(kind, &path) {
    Ok(()) => Removal::Removed,
    Err(e) if e.kind() == io::ErrorKind::NotFound => Removal::AlreadyGone,
    Err(error) => {
      registry.restore(entry.clone());
      Removal::Restored { entry, error }
    }
  }
}

/// Number of concurrent workers for a configured parallelism.
fn worker_limit(parallelism: usize) -> usize {
  parallelism.clamp(1, Semaphore::MAX_PERMITS)
}

fn remove_path(kind: TargetKind, path: &Path) -> io::Result<()> {
  match kind {
    TargetKind::File => fs::remove_file(path),
    TargetKind::Directory => fs::remove_dir_all(path),
  }
}

/// Materialize `jobs` concurrently.
///
/// Returns `(written, skipped)`. Malformed artifacts and write errors are
/// collected into `ProcessingFailed`; if any `recreate` artifact was still on
/// disk the aggregate is reported as `CleanUpFailed` instead.
async fn write_all(
  processor: &str,
  jobs: Vec<WriteJob>,
  ctx: &ProcessContext,
) -> Result<(usize, usize), ProcessError> {
  debug!(processor, artifacts = jobs.len(), "starting write phase");

  let semaphore = Arc::new(Semaphore::new(worker_limit(ctx.parallelism)));
  let mut join_set = JoinSet::new();
  let mut failures = Vec::new();
  let mut seen = HashSet::new();
  let mut cancelled = false;

  for job in jobs {
    if !seen.insert(job.id.clone()) {
      failures.push(ArtifactFailure::new(job.id, ArtifactError::DuplicateId));
      continue;
    }

    if job.path.as_os_str().is_empty() {
      failures.push(ArtifactFailure::new(job.id, ArtifactError::EmptyPath));
      continue;
    }

    if ctx.cancel.is_cancelled() {
      cancelled = true;
      break;
    }

    let Ok(permit) = semaphore.clone().acquire_owned().await else {
      break;
    };
    let registry = ctx.registry.clone();

    join_set.spawn_blocking(move || {
      let _permit = permit;
      let id = job.id.clone();
      write_one(&registry, job).map_err(|source| ArtifactFailure::new(id, source))
    });
  }

  let mut written = 0;
  let mut skipped = 0;

  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok(Ok(Written::Created)) => written += 1,
      Ok(Ok(Written::Skipped)) => skipped += 1,
      Ok(Err(failure)) => {
        error!(processor, artifact = %failure.artifact_id, error = %failure.source, "artifact failed");
        failures.push(failure);
      }
      Err(e) => {
        error!(processor, error = %e, "write task panicked");
        failures.push(ArtifactFailure::new("<unknown>", ArtifactError::Worker(e.to_string())));
      }
    }
  }

  if !failures.is_empty() {
    let still_present = failures
      .iter()
      .any(|f| matches!(f.source, ArtifactError::StillPresent(_)));

    return Err(if still_present {
      ProcessError::CleanUpFailed {
        processor: processor.to_string(),
        failures,
      }
    } else {
      ProcessError::ProcessingFailed {
        processor: processor.to_string(),
        failures,
      }
    });
  }

  if cancelled {
    return Err(ProcessError::Cancelled {
      processor: processor.to_string(),
    });
  }

  info!(processor, written, skipped, "write phase complete");
  Ok((written, skipped))
}

fn write_one(registry: &ProcessorRegistry, job: WriteJob) -> Result<Written, ArtifactError> {
  let policy = job.policy.unwrap_or(WritePolicy::WriteOnce);
  let path = absolute_path(&job.path)?;

  let exists = match fs::symlink_metadata(&path) {
    Ok(_) => true,
    Err(e) if e.kind() == io::ErrorKind::NotFound => false,
    Err(source) => return Err(ArtifactError::Probe { path, source }),
  };

  match (policy, exists) {
    (WritePolicy::WriteOnce, true) => {
      debug!(artifact = %job.id, path = %path.display(), "write-once artifact exists, skipping");
      return Ok(Written::Skipped);
    }
    (WritePolicy::Recreate, true) => return Err(ArtifactError::StillPresent(path)),
    _ => {}
  }

  match &job.payload {
    Payload::Directory => {
      fs::create_dir_all(&path).map_err(|source| ArtifactError::Write {
        path: path.clone(),
        source,
      })?;
    }
    Payload::File(data) => match write_file(&path, data, policy) {
      Ok(()) => {}
      // Someone else created it after the probe; write-once keeps theirs.
      Err(e) if policy == WritePolicy::WriteOnce && e.kind() == io::ErrorKind::AlreadyExists => {
        return Ok(Written::Skipped);
      }
      Err(source) => return Err(ArtifactError::Write { path, source }),
    },
  }

  if policy == WritePolicy::Recreate {
    registry.add(job.id.clone(), Some(tracking_metadata(&path, policy)));
  }

  debug!(
    artifact = %job.id,
    kind = ?job.payload.kind(),
    path = %path.display(),
    policy = %policy,
    "artifact written"
  );
  Ok(Written::Created)
}

/// Write `data` to a temporary sibling and rename it over `path`.
///
/// Readers see either no file or the complete one; a failed write leaves
/// nothing behind at `path`.
fn write_file(path: &Path, data: &[u8], policy: WritePolicy) -> io::Result<()> {
  let dir = path
    .parent()
    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory"))?;
  fs::create_dir_all(dir)?;

  let mut temp = tempfile::Builder::new()
    .prefix(&format!(".{APP_NAME}-"))
    .tempfile_in(dir)?;
  temp.write_all(data)?;
  temp.as_file().sync_all()?;

  match policy {
    WritePolicy::WriteOnce => temp.persist_noclobber(path).map_err(|e| e.error)?,
    WritePolicy::Recreate => temp.persist(path).map_err(|e| e.error)?,
  };

  Ok(())
}

fn absolute_path(path: &Path) -> Result<PathBuf, ArtifactError> {
  std::path::absolute(path)
    .map(|abs| dunce::simplified(&abs).to_path_buf())
    .map_err(|source| ArtifactError::ResolvePath {
      path: path.to_path_buf(),
      source,
    })
}

fn tracking_metadata(path: &Path, policy: WritePolicy) -> Metadata {
  let mut metadata = Metadata::new();
  metadata.insert(META_PATH.to_string(), Value::String(path.to_string_lossy().into_owned()));
  metadata.insert(META_WRITE_POLICY.to_string(), Value::String(policy.as_str().to_string()));
  metadata
}
