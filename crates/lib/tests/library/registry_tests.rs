//! Ledger persistence through the public registry API.

use std::fs;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use unitforge_lib::registry::{ArtifactRegistry, LedgerRegistry, ProcessorRegistry, RegistryEntry};

#[test]
fn empty_ledger_round_trips_two_recreate_entries() {
  let temp = TempDir::new().unwrap();
  let path = temp.path().join("registry.json");
  fs::write(&path, "").unwrap();

  let registry = Arc::new(LedgerRegistry::new(&path));
  registry.load().unwrap();
  assert!(registry.find_all("proc1").is_empty());

  let view = ProcessorRegistry::new(registry.clone(), "proc1");
  for (id, target) in [("one", "/out/one"), ("two", "/out/two")] {
    view.add(id, json!({ "path": target, "writePolicy": "recreate" }).as_object().cloned());
  }
  registry.save().unwrap();

  let reloaded = LedgerRegistry::new(&path);
  reloaded.load().unwrap();

  let entries = reloaded.find_all("proc1");
  let ids: Vec<_> = entries.iter().map(|e| e.artifact_id.as_str()).collect();
  assert_eq!(ids, vec!["one", "two"]);
  assert_eq!(entries[1].metadata_str("path"), Some("/out/two"));
  assert!(reloaded.generated_at().is_some());
  assert!(reloaded.find_all("other").is_empty());
}

#[test]
fn scopes_survive_round_trip_independently() {
  let temp = TempDir::new().unwrap();
  let path = temp.path().join("nested").join("registry.json");

  let registry = LedgerRegistry::new(&path);
  registry.add("files", RegistryEntry::new("shared", None));
  registry.add("directories", RegistryEntry::new("shared", json!({ "path": "/d" }).as_object().cloned()));
  registry.save().unwrap();

  let reloaded = LedgerRegistry::new(&path);
  reloaded.load().unwrap();
  assert!(reloaded.find_by_id("files", "shared").unwrap().metadata.is_none());
  assert_eq!(
    reloaded.find_by_id("directories", "shared").unwrap().metadata_str("path"),
    Some("/d")
  );
}
