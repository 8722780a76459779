//! Shared planning services
//!
//! A `Planner` bundles the injected stage implementations with the budget,
//! confidence and conflict settings. Sessions build their own orchestrator
//! from it so that progress events carry the right session ID.

use std::sync::Arc;

use tracing::debug;

use crate::domain::ConfidenceWeights;
use crate::events::EventEmitter;
use crate::modification::{ConflictDetector, ConflictRules, DependencyResolver, ModificationApplier};
use crate::pipeline::{BudgetAllocationStrategy, BudgetError, BudgetShares, Orchestrator, StageSet};

#[derive(Debug, Clone)]
pub struct Planner {
    stages: StageSet,
    strategy: BudgetAllocationStrategy,
    weights: ConfidenceWeights,
    rules: ConflictRules,
    resolver: DependencyResolver,
}

impl Planner {
    /// Create a planner; budget shares are validated here
    pub fn new(
        stages: StageSet,
        shares: BudgetShares,
        weights: ConfidenceWeights,
        rules: ConflictRules,
    ) -> Result<Self, BudgetError> {
        debug!(stages = stages.len(), "Planner::new: called");
        Ok(Self {
            stages,
            strategy: BudgetAllocationStrategy::new(shares)?,
            weights,
            rules,
            resolver: DependencyResolver::default(),
        })
    }

    /// Planner with default settings
    pub fn with_defaults(stages: StageSet) -> Self {
        Self {
            stages,
            strategy: BudgetAllocationStrategy::default(),
            weights: ConfidenceWeights::default(),
            rules: ConflictRules::default(),
            resolver: DependencyResolver::default(),
        }
    }

    pub fn strategy(&self) -> &BudgetAllocationStrategy {
        &self.strategy
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    pub fn detector(&self) -> ConflictDetector {
        ConflictDetector::new(self.rules.clone(), self.strategy.clone())
    }

    /// Orchestrator reporting on `emitter`
    pub fn orchestrator(&self, emitter: EventEmitter) -> Orchestrator {
        Orchestrator::new(self.stages.clone(), self.strategy.clone(), self.weights.clone()).with_emitter(emitter)
    }

    /// Applier sharing `orchestrator`'s stages and settings
    pub fn applier(&self, orchestrator: Arc<Orchestrator>) -> ModificationApplier {
        ModificationApplier::new(orchestrator, self.resolver.clone(), self.rules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::EstimateStage;

    #[test]
    fn test_rejects_invalid_shares() {
        let shares = BudgetShares {
            flight: 50.0,
            ..Default::default()
        };
        let result = Planner::new(
            EstimateStage::stage_set(),
            shares,
            ConfidenceWeights::default(),
            ConflictRules::default(),
        );
        assert!(matches!(result, Err(BudgetError::InvalidShares(_))));
    }

    #[test]
    fn test_detector_uses_rules() {
        let rules = ConflictRules {
            min_hotel_nightly_rate: 250_000.0,
            ..Default::default()
        };
        let planner = Planner::new(
            EstimateStage::stage_set(),
            BudgetShares::default(),
            ConfidenceWeights::default(),
            rules,
        )
        .unwrap();
        assert_eq!(planner.detector().rules().min_hotel_nightly_rate, 250_000.0);
    }
}
