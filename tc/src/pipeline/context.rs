//! Pipeline context
//!
//! Accumulates stage outputs during one run or batch. Outputs are inserted
//! only after their stage has executed in the current pass, so a stage can
//! only ever observe stages that precede it.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::budget::BudgetAllocation;
use super::error::StageExecutionError;
use crate::domain::{Modification, StageName, StageOutput, TripRequest};

#[derive(Debug, Clone)]
pub struct PipelineContext {
    request: TripRequest,
    allocation: BudgetAllocation,
    outputs: BTreeMap<StageName, Arc<StageOutput>>,
    modifications: Vec<Modification>,
    previous: Option<Arc<StageOutput>>,
}

impl PipelineContext {
    /// Fresh context with no outputs
    pub fn new(request: TripRequest, allocation: BudgetAllocation) -> Self {
        Self {
            request,
            allocation,
            outputs: BTreeMap::new(),
            modifications: Vec::new(),
            previous: None,
        }
    }

    pub fn request(&self) -> &TripRequest {
        &self.request
    }

    pub fn allocation(&self) -> &BudgetAllocation {
        &self.allocation
    }

    /// Output of an earlier stage, if it has run
    pub fn get(&self, stage: StageName) -> Option<&Arc<StageOutput>> {
        self.outputs.get(&stage)
    }

    /// Output of an earlier stage, or a `MissingInput` error on behalf of `requester`
    pub fn require(&self, stage: StageName, requester: StageName) -> Result<&Arc<StageOutput>, StageExecutionError> {
        self.outputs.get(&stage).ok_or(StageExecutionError::MissingInput {
            stage: requester,
            missing: stage,
        })
    }

    pub fn contains(&self, stage: StageName) -> bool {
        self.outputs.contains_key(&stage)
    }

    /// Record a stage output
    pub fn insert(&mut self, stage: StageName, output: Arc<StageOutput>) {
        self.outputs.insert(stage, output);
    }

    pub fn outputs(&self) -> &BTreeMap<StageName, Arc<StageOutput>> {
        &self.outputs
    }

    pub fn into_outputs(self) -> BTreeMap<StageName, Arc<StageOutput>> {
        self.outputs
    }

    /// Modifications of the current batch that target the stage about to run
    pub fn modifications(&self) -> &[Modification] {
        &self.modifications
    }

    pub fn set_modifications(&mut self, modifications: Vec<Modification>) {
        self.modifications = modifications;
    }

    /// Output the stage about to run produced before this batch, if any
    pub fn previous(&self) -> Option<&Arc<StageOutput>> {
        self.previous.as_ref()
    }

    pub fn set_previous(&mut self, previous: Option<Arc<StageOutput>>) {
        self.previous = previous;
    }

    /// Sum of `estimated_cost` across recorded outputs
    pub fn estimated_total(&self) -> f64 {
        self.outputs
            .values()
            .filter_map(|o| o.number("estimated_cost"))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DataSource;
    use crate::pipeline::BudgetAllocationStrategy;
    use chrono::NaiveDate;
    use serde_json::json;

    fn context() -> PipelineContext {
        let request = TripRequest::new(
            "Bali",
            NaiveDate::from_ymd_opt(2025, 7, 15).unwrap(),
            NaiveDate::from_ymd_opt(2025, 7, 20).unwrap(),
            10_000_000.0,
            1,
        )
        .unwrap();
        let allocation = BudgetAllocationStrategy::default().allocate(request.budget).unwrap();
        PipelineContext::new(request, allocation)
    }

    #[test]
    fn test_require_missing() {
        let ctx = context();
        let err = ctx.require(StageName::Flight, StageName::Budget).unwrap_err();
        assert_eq!(
            err,
            StageExecutionError::MissingInput {
                stage: StageName::Budget,
                missing: StageName::Flight,
            }
        );
    }

    #[test]
    fn test_insert_and_estimated_total() {
        let mut ctx = context();
        ctx.insert(
            StageName::Flight,
            Arc::new(StageOutput::new(json!({"estimated_cost": 2_000_000.0}), DataSource::Primary, 1.0)),
        );
        ctx.insert(
            StageName::Hotel,
            Arc::new(StageOutput::new(json!({"estimated_cost": 1_500_000.0}), DataSource::Primary, 1.0)),
        );
        ctx.insert(StageName::Destination, Arc::new(StageOutput::new(json!({}), DataSource::Primary, 1.0)));

        assert!(ctx.contains(StageName::Hotel));
        assert_eq!(ctx.estimated_total(), 3_500_000.0);
        assert_eq!(ctx.outputs().len(), 3);
    }
}
