//! Stage trait definition
//!
//! A stage is an external content generator (destination research, flight
//! search, ...). The pipeline only sees this narrow contract; stage
//! implementations are injected through a `StageSet`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::budget::BudgetConstraint;
use super::context::PipelineContext;
use super::error::StageExecutionError;
use crate::domain::{StageName, StageOutput, TripRequest};

/// Side information a stage reports alongside its output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageMetadata {
    /// One-line progress summary
    pub summary: String,

    /// Free-form details (timings, counts, backend names)
    #[serde(default)]
    pub details: Value,
}

impl StageMetadata {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            details: Value::Null,
        }
    }

    /// Builder method to attach details
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// A content-generating pipeline stage
#[async_trait]
pub trait Stage: Send + Sync {
    /// Which pipeline stage this implements
    fn name(&self) -> StageName;

    /// Execute the stage
    ///
    /// May read any output already present in `context`. Returns a
    /// zero-confidence output with warnings when nothing was found; an
    /// `Err` means the stage could not produce any output at all.
    async fn execute(
        &self,
        request: &TripRequest,
        context: &PipelineContext,
        budget: &BudgetConstraint,
    ) -> Result<(StageOutput, StageMetadata), StageExecutionError>;
}

/// Registry of stage implementations keyed by stage name
#[derive(Clone, Default)]
pub struct StageSet {
    stages: HashMap<StageName, Arc<dyn Stage>>,
}

impl StageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stage under its own name, replacing any previous one
    pub fn register(&mut self, stage: Arc<dyn Stage>) {
        debug!(stage = %stage.name(), "StageSet::register: called");
        self.stages.insert(stage.name(), stage);
    }

    /// Builder form of `register`
    pub fn with(mut self, stage: Arc<dyn Stage>) -> Self {
        self.register(stage);
        self
    }

    pub fn get(&self, name: StageName) -> Option<&Arc<dyn Stage>> {
        self.stages.get(&name)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stages with no registered implementation, in declaration order
    pub fn missing(&self) -> Vec<StageName> {
        StageName::ALL
            .iter()
            .copied()
            .filter(|s| !self.stages.contains_key(s))
            .collect()
    }
}

impl std::fmt::Debug for StageSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.stages.keys().copied().collect();
        names.sort();
        f.debug_struct("StageSet").field("stages", &names).finish()
    }
}
