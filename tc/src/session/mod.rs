//! Conversation sessions
//!
//! The state machine, per-session locking and the store that owns all
//! sessions.

mod error;
mod messages;
mod planner;
mod state;
mod store;
mod trip;

pub use error::SessionError;
pub use messages::{StoreCommand, StoreError, StoreResponse};
pub use planner::Planner;
pub use state::{ConversationState, IllegalTransition, SessionEvent, SessionFacts, transition};
pub use store::SessionStore;
pub use trip::{ConversationSession, QueueOutcome, SessionCounters, TripSession};
