//! End-to-end pipeline runs against a temporary directory.

use std::fs;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use unitforge_lib::pipeline::{Pipeline, PipelineConfig, RunMode, RunResult};

use super::common::{JsonDirLoader, JsonUnitLoader, OutputGenerator, TestEnv};

fn pipeline(env: &TestEnv, mode: RunMode) -> Pipeline {
  let config = PipelineConfig::default()
    .with_mode(mode)
    .with_parallelism(4)
    .with_registry_path(env.ledger_path());

  Pipeline::new(config)
    .with_source_loader(JsonDirLoader)
    .with_unit_loader(JsonUnitLoader)
    .with_generator(OutputGenerator { root: env.out_dir() })
    .with_default_processors()
}

async fn run(env: &TestEnv, mode: RunMode) -> RunResult {
  pipeline(env, mode).run(&[env.location()], CancellationToken::new()).await
}

fn ledger(env: &TestEnv) -> serde_json::Value {
  serde_json::from_str(&fs::read_to_string(env.ledger_path()).unwrap()).unwrap()
}

fn write_site(env: &TestEnv) {
  env.write_unit(
    "site.json",
    json!({ "name": "site", "kind": "dir", "body": { "path": "site", "policy": "recreate" } }),
  );
  env.write_unit(
    "index.json",
    json!({
      "name": "index",
      "kind": "file",
      "dependsOn": ["site"],
      "body": { "path": "site/index.html", "content": "<h1>hi</h1>", "policy": "recreate" }
    }),
  );
  env.write_unit(
    "config.json",
    json!({ "name": "config", "kind": "file", "body": { "path": "config.toml", "content": "v1" } }),
  );
}

#[tokio::test]
async fn run_through_writes_artifacts_and_ledger() {
  let env = TestEnv::new();
  write_site(&env);

  let result = run(&env, RunMode::RunThrough).await;
  let report = result.into_result().unwrap();

  assert_eq!(report.mode, RunMode::RunThrough);
  assert_eq!(report.location_count, 1);
  assert_eq!(report.source_count, 3);
  assert_eq!(report.unit_count, 3);
  assert_eq!(report.artifact_count, 3);
  assert!(report.warnings.is_empty());

  assert!(env.out_dir().join("site").is_dir());
  assert_eq!(
    fs::read_to_string(env.out_dir().join("site/index.html")).unwrap(),
    "<h1>hi</h1>"
  );
  assert_eq!(fs::read_to_string(env.out_dir().join("config.toml")).unwrap(), "v1");

  let ledger = ledger(&env);
  assert_eq!(ledger["entries"]["directories"][0]["artifactId"], "site");
  assert_eq!(ledger["entries"]["files"][0]["artifactId"], "index");
  assert_eq!(ledger["entries"]["files"].as_array().unwrap().len(), 1);
  assert_eq!(ledger["entries"]["files"][0]["metadata"]["writePolicy"], "recreate");
  assert!(ledger["generatedAt"].is_string());
}

#[tokio::test]
async fn second_run_cleans_stale_and_keeps_write_once() {
  let env = TestEnv::new();
  write_site(&env);
  run(&env, RunMode::RunThrough).await.into_result().unwrap();

  // Hand edits to a write-once file survive; the recreated tree does not.
  fs::write(env.out_dir().join("config.toml"), "edited").unwrap();
  fs::write(env.out_dir().join("site/extra.txt"), "stray").unwrap();
  env.remove_unit("index.json");

  let report = run(&env, RunMode::RunThrough).await.into_result().unwrap();

  assert_eq!(report.artifact_count, 2);
  assert_eq!(fs::read_to_string(env.out_dir().join("config.toml")).unwrap(), "edited");
  assert!(env.out_dir().join("site").is_dir());
  assert!(!env.out_dir().join("site/index.html").exists());
  assert!(!env.out_dir().join("site/extra.txt").exists());

  let files = &report.processed["files"];
  assert_eq!(files.removed, 1);
  assert_eq!(files.skipped, 1);
  assert_eq!(files.written, 0);

  let ledger = ledger(&env);
  assert!(ledger["entries"].get("files").is_none());
  assert_eq!(ledger["entries"]["directories"][0]["artifactId"], "site");
}

#[tokio::test]
async fn preview_writes_nothing() {
  let env = TestEnv::new();
  write_site(&env);

  let report = run(&env, RunMode::Preview).await.into_result().unwrap();

  assert_eq!(report.mode, RunMode::Preview);
  assert_eq!(report.artifact_count, 3);
  assert!(report.processed.is_empty());
  assert!(!env.out_dir().exists());
  assert!(!env.ledger_path().exists());
}

#[tokio::test]
async fn circular_units_abort_before_any_write() {
  let env = TestEnv::new();
  env.write_unit(
    "a.json",
    json!({ "name": "a", "kind": "file", "dependsOn": ["b"], "body": { "path": "a" } }),
  );
  env.write_unit(
    "b.json",
    json!({ "name": "b", "kind": "file", "dependsOn": ["a"], "body": { "path": "b" } }),
  );

  let result = run(&env, RunMode::RunThrough).await;

  let err = result.outcome.unwrap_err();
  assert_eq!(err.code(), "circular-dependency");
  assert_eq!(result.report.unit_count, 2);
  assert_eq!(result.report.artifact_count, 0);
  assert!(!env.out_dir().exists());
  assert!(!env.ledger_path().exists());
}

#[tokio::test]
async fn failed_cleanup_keeps_ledger_entry() {
  let env = TestEnv::new();
  env.write_unit(
    "report.json",
    json!({ "name": "report", "kind": "file", "body": { "path": "report.txt", "content": "r", "policy": "recreate" } }),
  );
  run(&env, RunMode::RunThrough).await.into_result().unwrap();

  // Something replaced the tracked file with a directory that remove_file cannot delete.
  let target = env.out_dir().join("report.txt");
  fs::remove_file(&target).unwrap();
  fs::create_dir_all(target.join("nested")).unwrap();

  let result = run(&env, RunMode::RunThrough).await;

  let err = result.outcome.unwrap_err();
  assert_eq!(err.code(), "clean-up-failed");
  assert!(target.is_dir());

  let ledger = ledger(&env);
  assert_eq!(ledger["entries"]["files"][0]["artifactId"], "report");
}

#[tokio::test]
async fn malformed_ledger_stops_processing() {
  let env = TestEnv::new();
  write_site(&env);
  fs::create_dir_all(env.ledger_path().parent().unwrap()).unwrap();
  fs::write(env.ledger_path(), "{ not json").unwrap();

  let result = run(&env, RunMode::RunThrough).await;

  assert_eq!(result.outcome.unwrap_err().code(), "registry-failed");
  assert!(!env.out_dir().exists());
  assert_eq!(fs::read_to_string(env.ledger_path()).unwrap(), "{ not json");
}

#[tokio::test]
async fn unsupported_and_broken_sources_are_warnings() {
  let env = TestEnv::new();
  write_site(&env);
  fs::write(env.units_dir().join("broken.json"), "{").unwrap();

  let missing = env.temp.path().join("missing");
  let result = pipeline(&env, RunMode::Preview)
    .run(
      &[env.location(), missing.to_string_lossy().into_owned().into()],
      CancellationToken::new(),
    )
    .await;

  let report = result.into_result().unwrap();
  assert_eq!(report.source_count, 4);
  assert_eq!(report.unit_count, 3);
  let codes: Vec<_> = report.warnings.iter().map(|w| w.code()).collect();
  assert_eq!(codes, vec!["unsupported-source", "load-failed"]);
}
