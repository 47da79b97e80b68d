//! Dependency graph construction and topological ordering.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, info};

use crate::unit::{DependencySet, Unit};

use super::types::{DependencyProvider, ResolveError};

/// Units plus the dependency set computed for each of them.
///
/// Units keep the order they were inserted in. That order is the tie-breaker
/// when several units become ready at the same time, so resolution is
/// deterministic for a given input.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
  units: Vec<Arc<dyn Unit>>,
  edges: HashMap<String, DependencySet>,
}

impl DependencyGraph {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build a graph from units and the providers that may add edges to them.
  ///
  /// Each unit's dependency set is the union of its declared dependencies
  /// and the names returned by every provider whose `supports` accepts it.
  ///
  /// # Errors
  ///
  /// Returns `DuplicateUnit` if two units share a name.
  pub fn build(units: &[Arc<dyn Unit>], providers: &[Arc<dyn DependencyProvider>]) -> Result<Self, ResolveError> {
    let mut graph = Self::new();

    for unit in units {
      let mut dependencies: DependencySet = unit.dependencies().iter().cloned().collect();

      for provider in providers {
        if provider.supports(unit.as_ref()) {
          dependencies.extend(provider.provide(unit.as_ref()));
        }
      }

      if !graph.insert(unit.clone(), dependencies) {
        return Err(ResolveError::DuplicateUnit(unit.name().to_string()));
      }
    }

    debug!(
      units = graph.len(),
      providers = providers.len(),
      "built dependency graph"
    );

    Ok(graph)
  }

  /// Insert a unit with its dependency set.
  ///
  /// Returns `false` and leaves the graph untouched if a unit with the same
  /// name is already present.
  pub fn insert(&mut self, unit: Arc<dyn Unit>, dependencies: DependencySet) -> bool {
    if self.edges.contains_key(unit.name()) {
      return false;
    }

    self.edges.insert(unit.name().to_string(), dependencies);
    self.units.push(unit);
    true
  }

  /// Union of two graphs. On a name clash the unit from `self` wins.
  pub fn merge(mut self, other: DependencyGraph) -> DependencyGraph {
    let DependencyGraph { units, mut edges } = other;

    for unit in units {
      let dependencies = edges.remove(unit.name()).unwrap_or_default();
      if !self.insert(unit.clone(), dependencies) {
        debug!(unit = %unit.name(), "unit already present, keeping first occurrence");
      }
    }

    self
  }

  /// Units in insertion order.
  pub fn units(&self) -> &[Arc<dyn Unit>] {
    &self.units
  }

  /// Dependency set of the unit called `name`.
  pub fn dependencies(&self, name: &str) -> Option<&DependencySet> {
    self.edges.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.edges.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.units.len()
  }

  pub fn is_empty(&self) -> bool {
    self.units.is_empty()
  }

  /// Order the units so that each one follows all of its dependencies.
  ///
  /// Kahn's algorithm over a ready set keyed by insertion index: whenever
  /// more than one unit is ready, the one inserted first goes next.
  ///
  /// # Errors
  ///
  /// When no unit is ready but some remain:
  /// - `Unresolved` if a remaining unit names a dependency that is not in the graph
  /// - `Circular` otherwise, listing the units that sit on a cycle
  pub fn resolve(&self) -> Result<Vec<Arc<dyn Unit>>, ResolveError> {
    let count = self.units.len();
    let index: HashMap<&str, usize> = self
      .units
      .iter()
      .enumerate()
      .map(|(i, unit)| (unit.name(), i))
      .collect();

    // Edges point from dependency to dependent.
    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(count, 0);
    let nodes: Vec<NodeIndex> = (0..count).map(|i| graph.add_node(i)).collect();
    let mut in_degree = vec![0usize; count];

    for (i, unit) in self.units.iter().enumerate() {
      let dependencies = self.dependency_set(unit.name());
      // Unknown names count too, so their dependents never become ready.
      in_degree[i] = dependencies.len();

      for dependency in dependencies {
        if let Some(&j) = index.get(dependency.as_str()) {
          graph.add_edge(nodes[j], nodes[i], ());
        }
      }
    }

    let mut ready: BTreeSet<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
    let mut resolved = vec![false; count];
    let mut order = Vec::with_capacity(count);

    while let Some(i) = ready.pop_first() {
      resolved[i] = true;
      order.push(self.units[i].clone());

      for dependent in graph.neighbors_directed(nodes[i], Direction::Outgoing) {
        let j = graph[dependent];
        in_degree[j] = in_degree[j].saturating_sub(1);
        if in_degree[j] == 0 && !resolved[j] {
          ready.insert(j);
        }
      }
    }

    if order.len() == count {
      info!(units = count, "resolved dependency order");
      return Ok(order);
    }

    let remaining: Vec<usize> = (0..count).filter(|&i| !resolved[i]).collect();

    for &i in &remaining {
      let unit = &self.units[i];
      if let Some(missing) = self
        .dependency_set(unit.name())
        .iter()
        .find(|name| !index.contains_key(name.as_str()))
      {
        return Err(ResolveError::Unresolved {
          unit: unit.name().to_string(),
          dependency: missing.clone(),
        });
      }
    }

    let mut cyclic: Vec<usize> = tarjan_scc(&graph)
      .into_iter()
      .filter(|component| component.len() > 1 || graph.contains_edge(component[0], component[0]))
      .flatten()
      .map(|node| graph[node])
      .collect();

    if cyclic.is_empty() {
      cyclic = remaining;
    }
    cyclic.sort_unstable();

    Err(ResolveError::Circular {
      units: cyclic.into_iter().map(|i| self.units[i].name().to_string()).collect(),
    })
  }

  fn dependency_set(&self, name: &str) -> &DependencySet {
    static EMPTY: DependencySet = BTreeSet::new();
    self.edges.get(name).unwrap_or(&EMPTY)
  }
}
