//! Pipeline error types

use thiserror::Error;

use super::budget::BudgetError;
use super::progress::RunProgress;
use crate::domain::{PlanError, RequestError, StageName};

/// Unrecoverable stage fault: the stage produced no output
///
/// "Nothing found" is not an error; stages report it as a zero-confidence output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageExecutionError {
    #[error("{stage} stage failed: {message}")]
    Failed { stage: StageName, message: String },

    #[error("{stage} stage requires {missing} output, which is not available")]
    MissingInput { stage: StageName, missing: StageName },
}

impl StageExecutionError {
    pub fn failed(stage: StageName, message: impl Into<String>) -> Self {
        Self::Failed {
            stage,
            message: message.into(),
        }
    }

    /// Stage that raised the error
    pub fn stage(&self) -> StageName {
        match self {
            Self::Failed { stage, .. } | Self::MissingInput { stage, .. } => *stage,
        }
    }
}

/// Errors that abort a planning run
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("Invalid trip request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("Budget allocation failed: {0}")]
    Budget(#[from] BudgetError),

    #[error("No implementation registered for stage '{0}'")]
    MissingStage(StageName),

    #[error("Stage {ordinal}/{total} ({stage}) failed: {message}")]
    StageFailed {
        stage: StageName,
        ordinal: usize,
        total: usize,
        message: String,
        progress: RunProgress,
    },

    #[error("Plan assembly failed: {0}")]
    Plan(#[from] PlanError),
}

impl PipelineError {
    /// Progress log up to the failure, when a stage failed
    pub fn progress(&self) -> Option<&RunProgress> {
        match self {
            PipelineError::StageFailed { progress, .. } => Some(progress),
            _ => None,
        }
    }

    /// Failing stage, when a stage failed
    pub fn stage(&self) -> Option<StageName> {
        match self {
            PipelineError::StageFailed { stage, .. } => Some(*stage),
            PipelineError::MissingStage(stage) => Some(*stage),
            _ => None,
        }
    }
}
