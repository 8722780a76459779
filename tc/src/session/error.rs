//! Session error types

use thiserror::Error;

use super::state::{ConversationState, IllegalTransition, SessionEvent};
use crate::modification::ApplyError;
use crate::pipeline::PipelineError;

/// Errors from session operations
///
/// Conflicts are not errors: a rejected modification is a normal
/// `QueueOutcome` with `accepted == false`.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Session is busy with another run or batch")]
    Busy,

    #[error("Cannot {operation} while {state}")]
    IllegalState {
        state: ConversationState,
        operation: SessionEvent,
    },

    #[error("Session has no plan yet")]
    NoPlan,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Apply(#[from] ApplyError),
}

impl From<IllegalTransition> for SessionError {
    fn from(e: IllegalTransition) -> Self {
        SessionError::IllegalState {
            state: e.state,
            operation: e.event,
        }
    }
}

impl SessionError {
    pub fn is_busy(&self) -> bool {
        matches!(self, SessionError::Busy)
    }
}
