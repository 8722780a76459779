//! Planning pipeline
//!
//! Budget allocation, the stage dependency graph, the `Stage` contract and
//! the orchestrator that drives a full planning run.

mod budget;
mod context;
mod error;
mod estimate;
mod graph;
mod orchestrator;
mod progress;
mod stage;

pub use budget::{
    BUDGET_EPSILON, BudgetAllocation, BudgetAllocationStrategy, BudgetCategory, BudgetConstraint, BudgetError,
    BudgetShares,
};
pub use context::PipelineContext;
pub use error::{PipelineError, StageExecutionError};
pub use estimate::{EstimateStage, NIGHTLY_FLOOR};
pub use graph::{DependencyGraph, GraphError, validate_dependency_graph};
pub use orchestrator::{Orchestrator, RunMetadata};
pub use progress::{ProgressEvent, ProgressKind, RunProgress};
pub use stage::{Stage, StageMetadata, StageSet};
