//! Pipeline orchestrator
//!
//! Runs every stage once, strictly sequentially, in the graph's execution
//! order. A run is all-or-nothing: the first stage failure aborts it and no
//! plan is produced.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::budget::{BudgetAllocation, BudgetAllocationStrategy, BudgetConstraint};
use super::context::PipelineContext;
use super::error::PipelineError;
use super::graph::DependencyGraph;
use super::progress::{ProgressEvent, ProgressKind, RunProgress};
use super::stage::{StageMetadata, StageSet};
use crate::domain::{ConfidenceWeights, Plan, StageName, TripRequest, format_amount, generate_id};
use crate::events::EventEmitter;

/// Side information of a successful run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub allocation: BudgetAllocation,
    pub progress: RunProgress,
    pub stage_metadata: BTreeMap<StageName, StageMetadata>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Drives stages in execution order
pub struct Orchestrator {
    stages: StageSet,
    graph: DependencyGraph,
    strategy: BudgetAllocationStrategy,
    weights: ConfidenceWeights,
    emitter: EventEmitter,
}

impl Orchestrator {
    pub fn new(stages: StageSet, strategy: BudgetAllocationStrategy, weights: ConfidenceWeights) -> Self {
        debug!(stages = stages.len(), "Orchestrator::new: called");
        Self {
            stages,
            graph: DependencyGraph::standard(),
            strategy,
            weights,
            emitter: EventEmitter::detached("orchestrator"),
        }
    }

    /// Builder method to report progress on an event bus
    pub fn with_emitter(mut self, emitter: EventEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn weights(&self) -> &ConfidenceWeights {
        &self.weights
    }

    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    /// Split the request's budget into category shares
    pub fn allocate(&self, request: &TripRequest) -> Result<BudgetAllocation, PipelineError> {
        Ok(self.strategy.allocate(request.budget)?)
    }

    /// Run every stage and assemble a plan
    pub async fn run(&self, request: &TripRequest) -> Result<(Plan, RunMetadata), PipelineError> {
        debug!(destination = %request.destination, "Orchestrator::run: called");
        let started_at = Utc::now();

        request.validate()?;
        if let Some(missing) = self.stages.missing().first() {
            return Err(PipelineError::MissingStage(*missing));
        }

        let allocation = self.allocate(request)?;
        info!(destination = %request.destination, "Starting planning run");
        for line in allocation.summary().lines() {
            debug!("{}", line);
        }

        let order = self.graph.execution_order().to_vec();
        let total = order.len();
        self.emitter.run_started(&request.destination, total);

        let mut context = PipelineContext::new(request.clone(), allocation.clone());
        let mut progress = RunProgress::new(total);
        let mut stage_metadata = BTreeMap::new();

        for (idx, stage) in order.iter().enumerate() {
            let constraint = BudgetConstraint::for_stage(*stage, &allocation);
            match self
                .run_stage(*stage, idx + 1, total, request, &mut context, &constraint, &mut progress)
                .await
            {
                Ok(metadata) => {
                    stage_metadata.insert(*stage, metadata);
                }
                Err(e) => {
                    self.emitter.run_completed(false, 0.0);
                    return Err(e);
                }
            }
        }

        let plan = Plan::assemble(request.clone(), context.into_outputs(), &self.weights)?;
        info!(
            overall_confidence = plan.overall_confidence,
            warnings = plan.warnings.len(),
            "Planning run complete"
        );
        self.emitter.run_completed(true, plan.overall_confidence);

        let metadata = RunMetadata {
            run_id: generate_id("run", &request.destination),
            allocation,
            progress,
            stage_metadata,
            started_at,
            completed_at: Utc::now(),
        };
        Ok((plan, metadata))
    }

    /// Execute one stage, record its output in `context`, and log progress
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn run_stage(
        &self,
        stage: StageName,
        ordinal: usize,
        total: usize,
        request: &TripRequest,
        context: &mut PipelineContext,
        constraint: &BudgetConstraint,
        progress: &mut RunProgress,
    ) -> Result<StageMetadata, PipelineError> {
        debug!(%stage, ordinal, total, "Orchestrator::run_stage: called");
        let implementation = self.stages.get(stage).ok_or(PipelineError::MissingStage(stage))?;

        progress.record(ProgressEvent::new(stage, ordinal, total, ProgressKind::Started, ""));
        self.emitter.stage_started(stage, ordinal, total);

        let (output, metadata) = match implementation.execute(request, context, constraint).await {
            Ok(result) => result,
            Err(e) => {
                let message = e.to_string();
                error!(%stage, ordinal, error = %message, "Stage failed");
                progress.record(ProgressEvent::new(stage, ordinal, total, ProgressKind::Failed, &message));
                self.emitter.stage_failed(stage, ordinal, total, &message);
                return Err(PipelineError::StageFailed {
                    stage,
                    ordinal,
                    total,
                    message,
                    progress: progress.clone(),
                });
            }
        };

        let summary = if metadata.summary.is_empty() {
            format!("confidence {:.2}", output.confidence)
        } else {
            metadata.summary.clone()
        };
        if output.is_degraded() {
            warn!(%stage, warnings = ?output.warnings, "Stage returned no data");
        }
        progress.record(ProgressEvent::new(stage, ordinal, total, ProgressKind::Completed, &summary));
        self.emitter
            .stage_completed(stage, ordinal, total, &summary, output.confidence);

        if matches!(stage, StageName::Flight | StageName::Hotel)
            && let Some(note) = over_budget_note(stage, output.number("estimated_cost"), constraint)
        {
            warn!(%stage, "{}", note);
            progress.record(ProgressEvent::new(stage, ordinal, total, ProgressKind::Note, note));
        }

        context.insert(stage, Arc::new(output));
        Ok(metadata)
    }
}

/// "exceeds budget by N%" note when a stage's estimate is above its share
fn over_budget_note(stage: StageName, cost: Option<f64>, constraint: &BudgetConstraint) -> Option<String> {
    let cost = cost?;
    if constraint.limit <= 0.0 || cost <= constraint.limit {
        return None;
    }
    let over = ((cost - constraint.limit) / constraint.limit * 100.0).round();
    Some(format!(
        "{} estimate {} exceeds budget by {:.0}%",
        stage,
        format_amount(cost),
        over
    ))
}
