//! Shared test helpers for the library tests.
//!
//! Units are JSON files in a directory:
//!
//! ```json
//! { "name": "readme", "kind": "file", "dependsOn": ["docs"],
//!   "body": { "path": "docs/README.md", "content": "hi", "policy": "recreate" } }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use serde::Deserialize;
use tempfile::TempDir;
use unitforge_lib::artifact::{Artifact, DirectoryArtifact, FileArtifact, WritePolicy};
use unitforge_lib::pipeline::{Generator, SourceLoader, UnitLoader};
use unitforge_lib::unit::{Source, SourceDescriptor, Unit, UnitDef};

/// Loads every `*.json` file of a directory as one source.
pub struct JsonDirLoader;

impl SourceLoader for JsonDirLoader {
  fn supports(&self, location: &SourceDescriptor) -> bool {
    Path::new(&location.0).is_dir()
  }

  fn load(&self, location: &SourceDescriptor) -> anyhow::Result<Vec<Source>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(&location.0)?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
      .collect();
    paths.sort();

    paths
      .into_iter()
      .map(|path| -> anyhow::Result<Source> {
        let data = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        Ok(Source::new(path.to_string_lossy().into_owned(), data, "json"))
      })
      .collect()
  }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnitFile {
  name: String,
  kind: String,
  #[serde(default)]
  depends_on: Vec<String>,
  #[serde(default)]
  body: serde_json::Value,
}

/// Parses one unit per JSON source.
pub struct JsonUnitLoader;

impl UnitLoader for JsonUnitLoader {
  fn supports(&self, source: &Source) -> bool {
    source.format() == "json"
  }

  fn load(&self, source: Arc<Source>) -> anyhow::Result<Vec<Arc<dyn Unit>>> {
    let file: UnitFile = serde_json::from_slice(source.data()).with_context(|| format!("parsing {}", source.location()))?;
    let unit: Arc<dyn Unit> = Arc::new(
      UnitDef::new(file.name, file.kind, source)
        .with_dependencies(file.depends_on)
        .with_body(file.body),
    );
    Ok(vec![unit])
  }
}

/// Emits a file or directory artifact under `root` for every `file`/`dir` unit.
pub struct OutputGenerator {
  pub root: PathBuf,
}

impl Generator for OutputGenerator {
  fn name(&self) -> &str {
    "output"
  }

  fn generate(&self, units: &[Arc<dyn Unit>]) -> anyhow::Result<Vec<Arc<dyn Artifact>>> {
    let mut artifacts: Vec<Arc<dyn Artifact>> = Vec::new();

    for unit in units {
      let Some(def) = unit.as_any().downcast_ref::<UnitDef>() else {
        continue;
      };
      let Some(rel) = def.body["path"].as_str() else {
        bail!("unit '{}' has no path", def.name);
      };
      let path = self.root.join(rel);
      let policy = def.body["policy"].as_str().map(str::parse::<WritePolicy>).transpose().map_err(anyhow::Error::msg)?;

      match def.kind.as_str() {
        "file" => {
          let content = def.body["content"].as_str().unwrap_or_default();
          let mut artifact = FileArtifact::new(def.name.clone(), path, content.as_bytes().to_vec());
          artifact.write_policy = policy;
          artifacts.push(Arc::new(artifact));
        }
        "dir" => {
          let mut artifact = DirectoryArtifact::new(def.name.clone(), path);
          artifact.write_policy = policy;
          artifacts.push(Arc::new(artifact));
        }
        _ => {}
      }
    }

    Ok(artifacts)
  }
}

/// Isolated workspace with a unit directory, an output directory and a ledger.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("units")).unwrap();
    Self { temp }
  }

  pub fn units_dir(&self) -> PathBuf {
    self.temp.path().join("units")
  }

  pub fn out_dir(&self) -> PathBuf {
    self.temp.path().join("out")
  }

  pub fn ledger_path(&self) -> PathBuf {
    self.temp.path().join("state").join("registry.json")
  }

  pub fn location(&self) -> SourceDescriptor {
    SourceDescriptor(self.units_dir().to_string_lossy().into_owned())
  }

  /// Write a unit file; `body` is the unit's JSON document.
  pub fn write_unit(&self, file_name: &str, body: serde_json::Value) {
    fs::write(self.units_dir().join(file_name), serde_json::to_vec_pretty(&body).unwrap()).unwrap();
  }

  pub fn remove_unit(&self, file_name: &str) {
    fs::remove_file(self.units_dir().join(file_name)).unwrap();
  }
}
