//! Property tests for dependency resolution.

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use unitforge_lib::resolve::{ResolveError, resolve};
use unitforge_lib::unit::{Source, Unit, UnitDef};

/// Units `u0..un` where each unit may only depend on lower-numbered units.
fn acyclic_units() -> impl Strategy<Value = Vec<Arc<dyn Unit>>> {
  (1usize..24)
    .prop_flat_map(|n| {
      let deps: Vec<_> = (0..n)
        .map(|i| proptest::collection::vec(0..i.max(1), 0..=i.min(4)))
        .collect();
      let order = Just((0..n).collect::<Vec<usize>>()).prop_shuffle();
      (deps, order)
    })
    .prop_map(|(deps, order)| {
      let source = Arc::new(Source::new("generated", Vec::new(), "test"));
      order
        .into_iter()
        .map(|i| {
          let names = deps[i].iter().filter(|&&d| d < i).map(|d| format!("u{d}"));
          Arc::new(UnitDef::new(format!("u{i}"), "test", source.clone()).with_dependencies(names)) as Arc<dyn Unit>
        })
        .collect()
    })
}

proptest! {
  #[test]
  fn every_unit_follows_its_dependencies(units in acyclic_units()) {
    let ordered = resolve(&units, &[]).unwrap();
    prop_assert_eq!(ordered.len(), units.len());

    let position: HashMap<&str, usize> = ordered.iter().enumerate().map(|(i, u)| (u.name(), i)).collect();
    for unit in &ordered {
      for dep in unit.dependencies() {
        prop_assert!(position[dep.as_str()] < position[unit.name()]);
      }
    }
  }

  #[test]
  fn resolution_is_deterministic(units in acyclic_units()) {
    let first: Vec<_> = resolve(&units, &[]).unwrap().iter().map(|u| u.name().to_string()).collect();
    let second: Vec<_> = resolve(&units, &[]).unwrap().iter().map(|u| u.name().to_string()).collect();
    prop_assert_eq!(first, second);
  }
}

#[test]
fn two_unit_cycle_is_always_circular() {
  let source = Arc::new(Source::new("inline", Vec::new(), "test"));
  let units: Vec<Arc<dyn Unit>> = vec![
    Arc::new(UnitDef::new("A", "test", source.clone()).with_dependencies(["B"])),
    Arc::new(UnitDef::new("B", "test", source).with_dependencies(["A"])),
  ];

  let err = resolve(&units, &[]).unwrap_err();
  assert_eq!(
    err,
    ResolveError::Circular {
      units: vec!["A".to_string(), "B".to_string()]
    }
  );
}
