//! Plan domain type
//!
//! A Plan aggregates one output per stage. It is assembled once from a
//! complete set of outputs and afterwards changes only by replacing whole
//! stage outputs.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::output::{StageName, StageOutput};
use super::request::TripRequest;

/// Tolerance used when checking that weights sum to 1.0
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// Errors from plan assembly
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("Cannot assemble plan: missing output for stage '{0}'")]
    MissingOutput(StageName),
}

/// Per-stage weights for the overall confidence score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub destination: f64,
    pub flight: f64,
    pub hotel: f64,
    pub dining: f64,
    pub budget: f64,
    pub itinerary: f64,
    pub verification: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            destination: 0.15,
            flight: 0.20,
            hotel: 0.20,
            dining: 0.15,
            budget: 0.10,
            itinerary: 0.15,
            verification: 0.05,
        }
    }
}

impl ConfidenceWeights {
    /// Weight for a stage
    pub fn weight(&self, stage: StageName) -> f64 {
        match stage {
            StageName::Destination => self.destination,
            StageName::Flight => self.flight,
            StageName::Hotel => self.hotel,
            StageName::Dining => self.dining,
            StageName::Budget => self.budget,
            StageName::Itinerary => self.itinerary,
            StageName::Verification => self.verification,
        }
    }

    /// Sum of all weights
    pub fn total(&self) -> f64 {
        StageName::ALL.iter().map(|s| self.weight(*s)).sum()
    }

    /// Weights must be non-negative and sum to 1.0
    pub fn is_valid(&self) -> bool {
        StageName::ALL.iter().all(|s| self.weight(*s) >= 0.0) && (self.total() - 1.0).abs() < WEIGHT_EPSILON
    }
}

/// The aggregate of all current stage outputs for one trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub request: TripRequest,

    outputs: BTreeMap<StageName, Arc<StageOutput>>,

    /// Weighted average of stage confidences
    pub overall_confidence: f64,

    /// Warnings of every stage, prefixed with the stage name
    pub warnings: Vec<String>,
}

impl Plan {
    /// Assemble a plan from a complete set of stage outputs
    pub fn assemble(
        request: TripRequest,
        outputs: BTreeMap<StageName, Arc<StageOutput>>,
        weights: &ConfidenceWeights,
    ) -> Result<Self, PlanError> {
        if let Some(missing) = StageName::ALL.iter().find(|s| !outputs.contains_key(s)) {
            return Err(PlanError::MissingOutput(*missing));
        }

        let mut plan = Self {
            request,
            outputs,
            overall_confidence: 0.0,
            warnings: Vec::new(),
        };
        plan.refresh(weights);
        Ok(plan)
    }

    /// Output of a stage
    pub fn output(&self, stage: StageName) -> Option<&Arc<StageOutput>> {
        self.outputs.get(&stage)
    }

    /// All outputs keyed by stage
    pub fn outputs(&self) -> &BTreeMap<StageName, Arc<StageOutput>> {
        &self.outputs
    }

    /// Replace a single stage output; call `refresh` once all replacements are done
    pub fn replace_output(&mut self, stage: StageName, output: Arc<StageOutput>) {
        self.outputs.insert(stage, output);
    }

    /// Recompute overall confidence and merged warnings
    pub fn refresh(&mut self, weights: &ConfidenceWeights) {
        self.overall_confidence = self
            .outputs
            .iter()
            .map(|(stage, output)| output.confidence * weights.weight(*stage))
            .sum::<f64>()
            .clamp(0.0, 1.0);

        self.warnings = self
            .outputs
            .iter()
            .flat_map(|(stage, output)| output.warnings.iter().map(move |w| format!("{}: {}", stage, w)))
            .collect();
    }
}
