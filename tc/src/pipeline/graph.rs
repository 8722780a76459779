//! Stage dependency graph
//!
//! Edges point from a stage to its prerequisites. Execution order is a
//! depth-first topological sort visiting stages in declaration order, so
//! ties always resolve the same way.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use thiserror::Error;

use crate::domain::StageName;

/// Errors from graph validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("Dependency cycle detected: {}", format_path(.0))]
    Cycle(Vec<StageName>),

    #[error("Stage {stage} depends on undeclared stage {prerequisite}")]
    UnknownPrerequisite { stage: StageName, prerequisite: StageName },
}

fn format_path(path: &[StageName]) -> String {
    path.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" -> ")
}

/// Prerequisite relation between stages
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    prerequisites: BTreeMap<StageName, Vec<StageName>>,
    order: Vec<StageName>,
}

impl DependencyGraph {
    /// The planning pipeline's graph
    pub fn standard() -> Self {
        use StageName::*;

        let prerequisites = BTreeMap::from([
            (Destination, vec![]),
            (Flight, vec![Destination]),
            (Hotel, vec![Destination]),
            (Dining, vec![Destination]),
            (Budget, vec![Flight, Hotel, Dining]),
            (Itinerary, vec![Destination, Hotel, Dining, Budget]),
            (Verification, vec![Budget, Itinerary]),
        ]);
        let order = topological_sort(&prerequisites);
        Self { prerequisites, order }
    }

    /// Build a graph from explicit edges, rejecting cycles
    pub fn new(prerequisites: BTreeMap<StageName, Vec<StageName>>) -> Result<Self, GraphError> {
        validate_dependency_graph(&prerequisites)?;
        let order = topological_sort(&prerequisites);
        Ok(Self { prerequisites, order })
    }

    /// Stages in execution order (prerequisites first)
    pub fn execution_order(&self) -> &[StageName] {
        &self.order
    }

    /// 1-based position of a stage in execution order
    pub fn ordinal(&self, stage: StageName) -> Option<usize> {
        self.order.iter().position(|s| *s == stage).map(|i| i + 1)
    }

    /// Direct prerequisites of a stage
    pub fn prerequisites(&self, stage: StageName) -> &[StageName] {
        self.prerequisites.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Stages that come strictly before `stage` in execution order
    pub fn earlier_than(&self, stage: StageName) -> &[StageName] {
        match self.order.iter().position(|s| *s == stage) {
            Some(idx) => &self.order[..idx],
            None => &[],
        }
    }

    /// The stage plus everything that transitively depends on it, in execution order
    pub fn dependents_closure(&self, stage: StageName) -> Vec<StageName> {
        let mut closure = BTreeSet::from([stage]);
        // Execution order guarantees prerequisites are seen before dependents
        for candidate in &self.order {
            if self.prerequisites(*candidate).iter().any(|p| closure.contains(p)) {
                closure.insert(*candidate);
            }
        }
        self.sort(closure)
    }

    /// Sort a set of stages into execution order, dropping duplicates
    pub fn sort(&self, stages: impl IntoIterator<Item = StageName>) -> Vec<StageName> {
        let wanted: BTreeSet<StageName> = stages.into_iter().collect();
        self.order.iter().copied().filter(|s| wanted.contains(s)).collect()
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::standard()
    }
}

/// Validate that every prerequisite is declared and the graph has no cycles
pub fn validate_dependency_graph(graph: &BTreeMap<StageName, Vec<StageName>>) -> Result<(), GraphError> {
    for (stage, prereqs) in graph {
        if let Some(missing) = prereqs.iter().find(|p| !graph.contains_key(p)) {
            return Err(GraphError::UnknownPrerequisite {
                stage: *stage,
                prerequisite: *missing,
            });
        }
    }

    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut cycle_path = Vec::new();

    for stage in graph.keys() {
        if !visited.contains(stage) && has_cycle_dfs(*stage, graph, &mut visited, &mut rec_stack, &mut cycle_path) {
            return Err(GraphError::Cycle(cycle_path));
        }
    }

    Ok(())
}

/// DFS helper for cycle detection
fn has_cycle_dfs(
    node: StageName,
    graph: &BTreeMap<StageName, Vec<StageName>>,
    visited: &mut HashSet<StageName>,
    rec_stack: &mut HashSet<StageName>,
    cycle_path: &mut Vec<StageName>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    cycle_path.push(node);

    if let Some(prereqs) = graph.get(&node) {
        for prereq in prereqs {
            if !visited.contains(prereq) {
                if graph.contains_key(prereq) && has_cycle_dfs(*prereq, graph, visited, rec_stack, cycle_path) {
                    return true;
                }
            } else if rec_stack.contains(prereq) {
                cycle_path.push(*prereq);
                return true;
            }
        }
    }

    rec_stack.remove(&node);
    cycle_path.pop();
    false
}

/// Depth-first topological sort, prerequisites first
fn topological_sort(graph: &BTreeMap<StageName, Vec<StageName>>) -> Vec<StageName> {
    let mut visited = HashSet::new();
    let mut result = Vec::new();

    // BTreeMap keys iterate in declaration order
    for stage in graph.keys() {
        topo_dfs(*stage, graph, &mut visited, &mut result);
    }

    result
}

fn topo_dfs(
    node: StageName,
    graph: &BTreeMap<StageName, Vec<StageName>>,
    visited: &mut HashSet<StageName>,
    result: &mut Vec<StageName>,
) {
    if !visited.insert(node) {
        return;
    }

    if let Some(prereqs) = graph.get(&node) {
        for prereq in prereqs {
            if graph.contains_key(prereq) {
                topo_dfs(*prereq, graph, visited, result);
            }
        }
    }
    result.push(node);
}
