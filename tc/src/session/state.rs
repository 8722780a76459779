//! Conversation state machine
//!
//! Pure transition function: given the current state and an event, return
//! the next state or reject the event. Sessions consult it before every
//! operation, so illegal calls are rejected rather than ignored.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// No plan yet
    #[default]
    Idle,
    /// Pipeline run in flight
    Planning,
    /// Plan exists, nothing pending
    Reviewing,
    /// Plan exists, modifications pending
    Modifying,
    /// Batch in flight
    Applying,
    /// Terminal
    Finalized,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::Reviewing => "reviewing",
            Self::Modifying => "modifying",
            Self::Applying => "applying",
            Self::Finalized => "finalized",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized)
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    SubmitRequest,
    PlanSucceeded,
    PlanFailed,
    QueueModification,
    ClearQueue,
    Apply,
    ApplySucceeded,
    ApplyFailed,
    Undo,
    Redo,
    Finalize,
}

impl SessionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmitRequest => "submit_request",
            Self::PlanSucceeded => "plan_succeeded",
            Self::PlanFailed => "plan_failed",
            Self::QueueModification => "queue_modification",
            Self::ClearQueue => "clear_queue",
            Self::Apply => "apply",
            Self::ApplySucceeded => "apply_succeeded",
            Self::ApplyFailed => "apply_failed",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::Finalize => "finalize",
        }
    }
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("'{event}' is not allowed while {state}")]
pub struct IllegalTransition {
    pub state: ConversationState,
    pub event: SessionEvent,
}

/// What the session holds when an event arrives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionFacts {
    pub has_plan: bool,
    pub has_pending: bool,
}

impl SessionFacts {
    pub fn new(has_plan: bool, has_pending: bool) -> Self {
        Self { has_plan, has_pending }
    }
}

/// Next state for `event`, or an error if the event is illegal in `state`
///
/// `facts` decide where failures land: modifying while modifications are
/// still pending, reviewing when only a plan exists, idle otherwise.
pub fn transition(
    state: ConversationState,
    event: SessionEvent,
    facts: SessionFacts,
) -> Result<ConversationState, IllegalTransition> {
    use ConversationState::*;
    use SessionEvent::*;

    let fallback = match (facts.has_plan, facts.has_pending) {
        (true, true) => Modifying,
        (true, false) => Reviewing,
        (false, _) => Idle,
    };
    let next = match (state, event) {
        (Idle, SubmitRequest) => Planning,
        (Planning, PlanSucceeded) => Reviewing,
        (Planning, PlanFailed) => fallback,
        (Reviewing | Modifying, QueueModification) => Modifying,
        (Reviewing | Modifying, ClearQueue) => Reviewing,
        (Reviewing | Modifying, Apply) => Applying,
        (Applying, ApplySucceeded) => Reviewing,
        (Applying, ApplyFailed) => fallback,
        (Reviewing | Modifying, Undo | Redo) => state,
        (Reviewing, Finalize) => Finalized,
        _ => return Err(IllegalTransition { state, event }),
    };
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConversationState::*;
    use SessionEvent::*;

    const NO_PLAN: SessionFacts = SessionFacts {
        has_plan: false,
        has_pending: false,
    };
    const PLAN: SessionFacts = SessionFacts {
        has_plan: true,
        has_pending: false,
    };
    const PENDING: SessionFacts = SessionFacts {
        has_plan: true,
        has_pending: true,
    };

    const ALL_EVENTS: [SessionEvent; 11] = [
        SubmitRequest,
        PlanSucceeded,
        PlanFailed,
        QueueModification,
        ClearQueue,
        Apply,
        ApplySucceeded,
        ApplyFailed,
        Undo,
        Redo,
        Finalize,
    ];

    #[test]
    fn test_happy_path() {
        let mut state = Idle;
        for event in [SubmitRequest, PlanSucceeded, QueueModification, Apply, ApplySucceeded, Finalize] {
            state = transition(state, event, PLAN).unwrap();
        }
        assert_eq!(state, Finalized);
    }

    #[test]
    fn test_failures_fall_back() {
        assert_eq!(transition(Planning, PlanFailed, NO_PLAN).unwrap(), Idle);
        assert_eq!(transition(Applying, ApplyFailed, PLAN).unwrap(), Reviewing);
        assert_eq!(transition(Applying, ApplyFailed, NO_PLAN).unwrap(), Idle);
    }

    #[test]
    fn test_failed_apply_with_pending_stays_modifying() {
        let state = transition(Applying, ApplyFailed, PENDING).unwrap();
        assert_eq!(state, Modifying);
        assert!(transition(state, Finalize, PENDING).is_err());
        assert_eq!(transition(state, Apply, PENDING).unwrap(), Applying);
        assert_eq!(transition(state, ClearQueue, PENDING).unwrap(), Reviewing);
    }

    #[test]
    fn test_illegal_calls_rejected() {
        let err = transition(Idle, Apply, NO_PLAN).unwrap_err();
        assert_eq!(err.to_string(), "'apply' is not allowed while idle");
        assert!(transition(Planning, QueueModification, NO_PLAN).is_err());
        assert!(transition(Applying, Apply, PLAN).is_err());
        assert!(transition(Modifying, Finalize, PLAN).is_err());
    }

    #[test]
    fn test_finalized_is_terminal() {
        for event in ALL_EVENTS {
            assert!(transition(Finalized, event, PLAN).is_err());
        }
        assert!(Finalized.is_terminal());
    }

    #[test]
    fn test_undo_redo_keep_state() {
        assert_eq!(transition(Reviewing, Undo, PLAN).unwrap(), Reviewing);
        assert_eq!(transition(Modifying, Redo, PLAN).unwrap(), Modifying);
        assert!(transition(Idle, Undo, NO_PLAN).is_err());
    }

    #[test]
    fn test_in_flight_states_accept_only_completion() {
        for event in ALL_EVENTS {
            let planning_ok = matches!(event, PlanSucceeded | PlanFailed);
            assert_eq!(transition(Planning, event, NO_PLAN).is_ok(), planning_ok, "planning + {event}");
            let applying_ok = matches!(event, ApplySucceeded | ApplyFailed);
            assert_eq!(transition(Applying, event, PLAN).is_ok(), applying_ok, "applying + {event}");
        }
    }
}
