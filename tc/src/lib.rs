//! TripCraft - budget-aware trip planning core
//!
//! A trip request flows through seven stages (destination, flight, hotel,
//! dining, budget, itinerary, verification) that each receive a share of the
//! budget and the outputs of earlier stages. Once a plan exists, users queue
//! modifications that are checked for conflicts, applied as all-or-nothing
//! batches that re-run only the affected stages, and recorded in an
//! undo/redo history.
//!
//! # Modules
//!
//! - [`domain`] - Requests, stage outputs, plans and modifications
//! - [`pipeline`] - Budget allocation, dependency graph and the orchestrator
//! - [`modification`] - Conflict detection, resolution, queue, applier, history
//! - [`session`] - Conversation state machine, sessions and the session store
//! - [`events`] - Broadcast of progress and session events
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod events;
pub mod modification;
pub mod pipeline;
pub mod session;
