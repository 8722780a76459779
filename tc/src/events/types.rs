//! Event types for TripCraft activity streaming
//!
//! These events represent the observable activity of a planning session:
//! - Pipeline runs (start, per-stage progress, completion)
//! - Modification queueing (accepted, rejected)
//! - Batch application and history navigation
//! - Session state transitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::StageName;

/// Core event enum - the vocabulary of TripCraft activity
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TripEvent {
    // === Pipeline Runs ===
    /// A planning run has started
    RunStarted {
        session_id: String,
        destination: String,
        total_stages: usize,
    },
    /// A stage has started executing
    StageStarted {
        session_id: String,
        stage: StageName,
        ordinal: usize,
        total: usize,
    },
    /// A stage has produced its output
    StageCompleted {
        session_id: String,
        stage: StageName,
        ordinal: usize,
        total: usize,
        summary: String,
        confidence: f64,
    },
    /// A stage failed; the run or batch is aborted
    StageFailed {
        session_id: String,
        stage: StageName,
        ordinal: usize,
        total: usize,
        message: String,
    },
    /// A planning run has finished
    RunCompleted {
        session_id: String,
        success: bool,
        overall_confidence: f64,
    },

    // === Modifications ===
    /// A modification passed conflict checks and was queued
    ModificationQueued {
        session_id: String,
        modification_id: String,
        description: String,
        pending: usize,
    },
    /// A modification was rejected with blocking conflicts
    ModificationRejected {
        session_id: String,
        description: String,
        conflicts: Vec<String>,
    },
    /// A batch of modifications was applied or rolled back
    BatchApplied {
        session_id: String,
        modifications: usize,
        stages: Vec<StageName>,
        success: bool,
    },
    /// The history cursor moved
    HistoryMoved {
        session_id: String,
        direction: String,
        cursor: i64,
    },

    // === Session ===
    /// The conversation state changed
    StateChanged {
        session_id: String,
        from: String,
        to: String,
    },
}

impl TripEvent {
    /// Session this event belongs to
    pub fn session_id(&self) -> &str {
        match self {
            TripEvent::RunStarted { session_id, .. }
            | TripEvent::StageStarted { session_id, .. }
            | TripEvent::StageCompleted { session_id, .. }
            | TripEvent::StageFailed { session_id, .. }
            | TripEvent::RunCompleted { session_id, .. }
            | TripEvent::ModificationQueued { session_id, .. }
            | TripEvent::ModificationRejected { session_id, .. }
            | TripEvent::BatchApplied { session_id, .. }
            | TripEvent::HistoryMoved { session_id, .. }
            | TripEvent::StateChanged { session_id, .. } => session_id,
        }
    }

    /// Event type name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            TripEvent::RunStarted { .. } => "RunStarted",
            TripEvent::StageStarted { .. } => "StageStarted",
            TripEvent::StageCompleted { .. } => "StageCompleted",
            TripEvent::StageFailed { .. } => "StageFailed",
            TripEvent::RunCompleted { .. } => "RunCompleted",
            TripEvent::ModificationQueued { .. } => "ModificationQueued",
            TripEvent::ModificationRejected { .. } => "ModificationRejected",
            TripEvent::BatchApplied { .. } => "BatchApplied",
            TripEvent::HistoryMoved { .. } => "HistoryMoved",
            TripEvent::StateChanged { .. } => "StateChanged",
        }
    }
}

/// A timestamped event, as recorded by subscribers
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub event: TripEvent,
}

impl EventLogEntry {
    /// Create a new log entry with current timestamp
    pub fn new(event: TripEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}
