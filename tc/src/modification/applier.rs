//! Modification applier
//!
//! Re-executes the stages a batch affects, in execution order, against a
//! working copy of the plan. Batches are all-or-nothing: the caller's plan
//! is never touched, and the working copy is only returned on success.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

use super::conflict::ConflictRules;
use super::resolver::DependencyResolver;
use crate::domain::{HotelConstraint, Modification, ModificationAction, ModificationResult, Plan, StageName};
use crate::pipeline::{BudgetConstraint, Orchestrator, PipelineContext, PipelineError, RunProgress};

/// A batch failed and was rolled back
#[derive(Debug, Clone, Error)]
#[error("Batch rolled back: {error}")]
pub struct ApplyError {
    #[source]
    pub error: PipelineError,

    /// One failed result per modification of the batch
    pub results: Vec<ModificationResult>,
}

/// A successfully applied batch
#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub plan: Plan,
    pub results: Vec<ModificationResult>,
    /// Stages that were re-run, in order
    pub stages: Vec<StageName>,
    pub progress: RunProgress,
}

pub struct ModificationApplier {
    orchestrator: Arc<Orchestrator>,
    resolver: DependencyResolver,
    rules: ConflictRules,
}

impl ModificationApplier {
    pub fn new(orchestrator: Arc<Orchestrator>, resolver: DependencyResolver, rules: ConflictRules) -> Self {
        Self {
            orchestrator,
            resolver,
            rules,
        }
    }

    /// Apply a batch to `plan`
    ///
    /// An empty batch returns the plan unchanged with no results.
    pub async fn apply_all(&self, modifications: &[Modification], plan: &Plan) -> Result<ApplyOutcome, ApplyError> {
        debug!(count = modifications.len(), "ModificationApplier::apply_all: called");
        if modifications.is_empty() {
            return Ok(ApplyOutcome {
                plan: plan.clone(),
                results: Vec::new(),
                stages: Vec::new(),
                progress: RunProgress::new(0),
            });
        }

        let groups = self.resolver.group(modifications);
        let stages: Vec<StageName> = groups.iter().map(|g| g.stage).collect();
        info!(modifications = modifications.len(), ?stages, "Applying modification batch");

        let allocation = self
            .orchestrator
            .allocate(&plan.request)
            .map_err(|e| rolled_back(e, modifications))?;

        let graph = self.orchestrator.graph();
        let total = groups.len();
        let mut working = plan.clone();
        let mut progress = RunProgress::new(total);

        for (idx, group) in groups.iter().enumerate() {
            let stage = group.stage;

            // Rebuilt from the working plan: only stages that precede this one
            let mut context = PipelineContext::new(plan.request.clone(), allocation.clone());
            for earlier in graph.earlier_than(stage) {
                if let Some(output) = working.output(*earlier) {
                    context.insert(*earlier, output.clone());
                }
            }
            context.set_modifications(group.modifications.clone());
            context.set_previous(working.output(stage).cloned());

            let ceiling = self.price_ceiling(stage, &group.modifications, &working);
            let constraint = BudgetConstraint::for_stage(stage, &allocation).with_price_ceiling(ceiling);

            if let Err(e) = self
                .orchestrator
                .run_stage(stage, idx + 1, total, &plan.request, &mut context, &constraint, &mut progress)
                .await
            {
                error!(%stage, error = %e, "Batch failed, rolling back");
                self.orchestrator
                    .emitter()
                    .batch_applied(modifications.len(), stages.clone(), false);
                return Err(rolled_back(e, modifications));
            }

            if let Some(output) = context.get(stage) {
                working.replace_output(stage, output.clone());
            }
        }

        working.refresh(self.orchestrator.weights());

        let results = modifications
            .iter()
            .map(|m| {
                let warnings = m
                    .affected_stages
                    .iter()
                    .filter_map(|s| working.output(*s).map(|o| (s, o)))
                    .flat_map(|(s, o)| o.warnings.iter().map(move |w| format!("{}: {}", s, w)))
                    .collect();
                ModificationResult::applied(m.clone(), warnings)
            })
            .collect();

        info!(
            stages = stages.len(),
            overall_confidence = working.overall_confidence,
            "Batch applied"
        );
        self.orchestrator
            .emitter()
            .batch_applied(modifications.len(), stages.clone(), true);

        Ok(ApplyOutcome {
            plan: working,
            results,
            stages,
            progress,
        })
    }

    /// Per-unit ceiling requested by the stage's modifications (last one wins)
    fn price_ceiling(&self, stage: StageName, modifications: &[Modification], working: &Plan) -> Option<f64> {
        modifications.iter().rev().find_map(|m| match (&m.action, stage) {
            (ModificationAction::ChangeHotel(params), StageName::Hotel) => match (params.max_price, params.constraint) {
                (Some(max), _) => Some(max),
                (None, Some(HotelConstraint::Cheaper)) => working
                    .output(StageName::Hotel)
                    .and_then(|o| o.number("nightly_rate"))
                    .map(|rate| rate * self.rules.cheaper_factor),
                _ => None,
            },
            (ModificationAction::ChangeFlight(params), StageName::Flight) => params.max_price,
            _ => None,
        })
    }
}

fn rolled_back(error: PipelineError, modifications: &[Modification]) -> ApplyError {
    let message = error.to_string();
    ApplyError {
        error,
        results: modifications
            .iter()
            .map(|m| ModificationResult::failed(m.clone(), message.clone()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeHotelParams, ConfidenceWeights, StageOutput, TripRequest};
    use crate::pipeline::{
        BudgetAllocationStrategy, EstimateStage, Stage, StageExecutionError, StageMetadata, StageSet,
    };
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct FailingStage(StageName);

    #[async_trait]
    impl Stage for FailingStage {
        fn name(&self) -> StageName {
            self.0
        }

        async fn execute(
            &self,
            _request: &TripRequest,
            _context: &PipelineContext,
            _budget: &BudgetConstraint,
        ) -> Result<(StageOutput, StageMetadata), StageExecutionError> {
            Err(StageExecutionError::failed(self.0, "backend down"))
        }
    }

    fn request() -> TripRequest {
        TripRequest::new(
            "Bali, Indonesia",
            NaiveDate::from_ymd_opt(2025, 7, 15).unwrap(),
            NaiveDate::from_ymd_opt(2025, 7, 20).unwrap(),
            15_000_000.0,
            2,
        )
        .unwrap()
    }

    fn orchestrator(stages: StageSet) -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(
            stages,
            BudgetAllocationStrategy::default(),
            ConfidenceWeights::default(),
        ))
    }

    fn applier(orchestrator: Arc<Orchestrator>) -> ModificationApplier {
        ModificationApplier::new(orchestrator, DependencyResolver::default(), ConflictRules::default())
    }

    fn change_hotel(max_price: Option<f64>, constraint: Option<HotelConstraint>) -> Modification {
        DependencyResolver::default()
            .resolve(ModificationAction::ChangeHotel(ChangeHotelParams { max_price, constraint }))
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let orchestrator = orchestrator(EstimateStage::stage_set());
        let (plan, _) = orchestrator.run(&request()).await.unwrap();

        let outcome = applier(orchestrator).apply_all(&[], &plan).await.unwrap();
        assert_eq!(outcome.plan, plan);
        assert!(outcome.results.is_empty());
        assert!(outcome.stages.is_empty());
    }

    #[tokio::test]
    async fn test_change_hotel_reruns_only_affected_stages() {
        let orchestrator = orchestrator(EstimateStage::stage_set());
        let (plan, _) = orchestrator.run(&request()).await.unwrap();

        let outcome = applier(orchestrator)
            .apply_all(&[change_hotel(Some(500_000.0), None)], &plan)
            .await
            .unwrap();

        assert_eq!(
            outcome.stages,
            vec![StageName::Hotel, StageName::Budget, StageName::Itinerary]
        );
        for untouched in [StageName::Destination, StageName::Flight, StageName::Dining, StageName::Verification] {
            assert!(Arc::ptr_eq(
                outcome.plan.output(untouched).unwrap(),
                plan.output(untouched).unwrap()
            ));
        }
        let hotel = outcome.plan.output(StageName::Hotel).unwrap();
        assert_eq!(hotel.number("nightly_rate"), Some(500_000.0));
        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.results[0].success);
    }

    #[tokio::test]
    async fn test_cheaper_constraint_uses_current_rate() {
        let orchestrator = orchestrator(EstimateStage::stage_set());
        let (plan, _) = orchestrator.run(&request()).await.unwrap();
        let current = plan.output(StageName::Hotel).unwrap().number("nightly_rate").unwrap();

        let outcome = applier(orchestrator)
            .apply_all(&[change_hotel(None, Some(HotelConstraint::Cheaper))], &plan)
            .await
            .unwrap();

        let rate = outcome.plan.output(StageName::Hotel).unwrap().number("nightly_rate").unwrap();
        assert!((rate - current * 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_whole_batch() {
        let healthy = orchestrator(EstimateStage::stage_set());
        let (plan, _) = healthy.run(&request()).await.unwrap();
        let before = serde_json::to_string(&plan).unwrap();

        let broken = orchestrator(EstimateStage::stage_set().with(Arc::new(FailingStage(StageName::Budget))));
        let batch = vec![change_hotel(Some(500_000.0), None), change_hotel(Some(600_000.0), None)];

        let err = applier(broken).apply_all(&batch, &plan).await.unwrap_err();
        assert_eq!(err.error.stage(), Some(StageName::Budget));
        assert_eq!(err.results.len(), 2);
        assert!(err.results.iter().all(|r| !r.success));
        assert!(err.results[0].errors[0].contains("backend down"));
        assert_eq!(serde_json::to_string(&plan).unwrap(), before);
    }
}
