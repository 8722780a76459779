//! Incremental modification engine
//!
//! Conflict detection, dependency resolution, the pending queue, batch
//! application and undo/redo history.

mod applier;
mod conflict;
mod history;
mod queue;
mod resolver;

pub use applier::{ApplyError, ApplyOutcome, ModificationApplier};
pub use conflict::{Conflict, ConflictDetector, ConflictRules, ConflictType, Severity, has_blocking};
pub use history::{HistoryEntry, HistoryStack, INITIAL_PLAN_LABEL};
pub use queue::ModificationQueue;
pub use resolver::{DependencyResolver, StageBatch};
