//! Dependency resolution
//!
//! Maps each action to the stages that must re-run, and groups a batch of
//! modifications by stage in execution order.

use serde::Serialize;
use tracing::debug;

use crate::domain::{Modification, ModificationAction, StageName};
use crate::pipeline::DependencyGraph;

/// One stage to re-run, with the modifications that target it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageBatch {
    pub stage: StageName,
    pub modifications: Vec<Modification>,
}

/// Maps modifications to the minimal ordered set of stages to re-run
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver {
    graph: DependencyGraph,
}

impl DependencyResolver {
    pub fn new(graph: DependencyGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Stages an action requires to re-run, in execution order
    pub fn affected_stages(&self, action: &ModificationAction) -> Vec<StageName> {
        use StageName::*;

        let declared = match action {
            ModificationAction::ChangeHotel(_) => vec![Hotel, Budget, Itinerary],
            ModificationAction::ChangeFlight(_) => vec![Flight, Budget, Itinerary],
            ModificationAction::ChangeMeal(_) => vec![Dining, Budget, Itinerary],
            ModificationAction::AddActivity(_)
            | ModificationAction::RemoveActivity(_)
            | ModificationAction::AddCustomItem(_) => vec![Budget, Itinerary],
            ModificationAction::RegenerateComponent(params) => self.graph.dependents_closure(params.component),
        };
        self.graph.sort(declared)
    }

    /// Build a modification with its affected stages resolved
    pub fn resolve(&self, action: ModificationAction) -> Modification {
        let affected = self.affected_stages(&action);
        debug!(action = action.kind(), ?affected, "DependencyResolver::resolve: called");
        Modification::new(action, affected)
    }

    /// Group a batch by affected stage, in execution order
    ///
    /// Stages no modification touches are skipped. Within a stage,
    /// modifications keep their queue order.
    pub fn group(&self, modifications: &[Modification]) -> Vec<StageBatch> {
        self.graph
            .execution_order()
            .iter()
            .filter_map(|stage| {
                let targeting: Vec<Modification> = modifications
                    .iter()
                    .filter(|m| m.affects(*stage))
                    .cloned()
                    .collect();
                (!targeting.is_empty()).then(|| StageBatch {
                    stage: *stage,
                    modifications: targeting,
                })
            })
            .collect()
    }
}
