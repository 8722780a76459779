//! Trip sessions
//!
//! A `TripSession` owns one conversation: the current plan, the pending
//! queue and the history. Every mutating operation takes the session lock
//! with `try_lock`, so a second run or batch while one is in flight is
//! rejected with `SessionError::Busy` instead of queueing behind it.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::error::SessionError;
use super::planner::Planner;
use super::state::{ConversationState, SessionEvent, SessionFacts, transition};
use crate::domain::{Modification, ModificationAction, Plan, TripRequest};
use crate::events::EventEmitter;
use crate::modification::{
    ApplyOutcome, Conflict, ConflictDetector, DependencyResolver, HistoryEntry, HistoryStack, ModificationApplier,
    ModificationQueue, has_blocking,
};
use crate::pipeline::{Orchestrator, RunMetadata};

/// Per-session operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounters {
    pub operations: u64,
    pub runs: u64,
    pub batches_applied: u64,
    pub rejected: u64,
}

/// Mutable conversation state guarded by the session lock
#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub state: ConversationState,
    pub request: Option<TripRequest>,
    pub plan: Option<Plan>,
    pub queue: ModificationQueue,
    pub history: HistoryStack,
    pub counters: SessionCounters,
}

impl ConversationSession {
    fn new() -> Self {
        Self {
            state: ConversationState::Idle,
            request: None,
            plan: None,
            queue: ModificationQueue::new(),
            history: HistoryStack::new(),
            counters: SessionCounters::default(),
        }
    }

    /// Fail unless `event` is legal right now
    fn ensure(&self, event: SessionEvent) -> Result<ConversationState, SessionError> {
        let facts = SessionFacts::new(self.plan.is_some(), !self.queue.is_empty());
        Ok(transition(self.state, event, facts)?)
    }

    /// Move to the state `event` leads to
    fn advance(&mut self, event: SessionEvent, emitter: &EventEmitter) -> Result<(), SessionError> {
        let next = self.ensure(event)?;
        if next != self.state {
            debug!(from = %self.state, to = %next, %event, "ConversationSession::advance: state change");
            emitter.state_changed(self.state.as_str(), next.as_str());
            self.state = next;
        }
        Ok(())
    }
}

/// Result of queueing a modification
#[derive(Debug, Clone, Serialize)]
pub struct QueueOutcome {
    pub accepted: bool,
    pub pending_count: usize,
    /// Blocking conflicts when rejected, warnings when accepted
    pub conflicts: Vec<Conflict>,
    /// The queued modification, when accepted
    pub modification: Option<Modification>,
}

pub struct TripSession {
    id: String,
    created_at: DateTime<Utc>,
    inner: Mutex<ConversationSession>,
    orchestrator: Arc<Orchestrator>,
    applier: ModificationApplier,
    detector: ConflictDetector,
    resolver: DependencyResolver,
    emitter: EventEmitter,
    last_active: AtomicI64,
}

impl TripSession {
    /// Create a session; its events go to `emitter`
    pub fn new(planner: &Planner, emitter: EventEmitter) -> Self {
        let id = emitter.session_id().to_string();
        debug!(%id, "TripSession::new: called");
        let orchestrator = Arc::new(planner.orchestrator(emitter.clone()));
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            inner: Mutex::new(ConversationSession::new()),
            applier: planner.applier(orchestrator.clone()),
            orchestrator,
            detector: planner.detector(),
            resolver: planner.resolver().clone(),
            emitter,
            last_active: AtomicI64::new(now.timestamp_millis()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time since the last operation
    pub fn idle_for(&self) -> chrono::Duration {
        let last = self.last_active.load(Ordering::Relaxed);
        chrono::Duration::milliseconds(Utc::now().timestamp_millis() - last)
    }

    /// Take the session lock for a mutating operation
    fn acquire(&self) -> Result<MutexGuard<'_, ConversationSession>, SessionError> {
        let mut guard = self.inner.try_lock().map_err(|_| {
            warn!(session_id = %self.id, "Session busy, rejecting operation");
            SessionError::Busy
        })?;
        guard.counters.operations += 1;
        self.last_active.store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        Ok(guard)
    }

    /// Run the full pipeline for `request`
    ///
    /// On success the plan becomes the baseline history entry. On failure
    /// the session returns to idle and the error carries the progress log.
    pub async fn run_pipeline(&self, request: TripRequest) -> Result<(Plan, RunMetadata), SessionError> {
        debug!(session_id = %self.id, destination = %request.destination, "TripSession::run_pipeline: called");
        let mut session = self.acquire()?;
        session.advance(SessionEvent::SubmitRequest, &self.emitter)?;
        session.counters.runs += 1;

        match self.orchestrator.run(&request).await {
            Ok((plan, metadata)) => {
                session.request = Some(request);
                session.plan = Some(plan.clone());
                session.history.push(HistoryEntry::baseline(plan.clone()));
                session.advance(SessionEvent::PlanSucceeded, &self.emitter)?;
                info!(session_id = %self.id, run_id = %metadata.run_id, "Session plan ready");
                Ok((plan, metadata))
            }
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Session planning failed");
                session.advance(SessionEvent::PlanFailed, &self.emitter)?;
                Err(e.into())
            }
        }
    }

    /// Check a modification and queue it when nothing blocks it
    ///
    /// A rejection is a normal outcome: `accepted` is false, the blocking
    /// conflicts are returned and the queue is unchanged.
    pub async fn queue_modification(&self, action: ModificationAction) -> Result<QueueOutcome, SessionError> {
        debug!(session_id = %self.id, kind = action.kind(), "TripSession::queue_modification: called");
        let mut session = self.acquire()?;
        session.ensure(SessionEvent::QueueModification)?;
        let plan = session.plan.as_ref().ok_or(SessionError::NoPlan)?;

        let modification = self.resolver.resolve(action);
        let mut conflicts = self.detector.check(&modification, plan);
        conflicts.extend(self.detector.check_pending(&modification, session.queue.pending()));

        if has_blocking(&conflicts) {
            session.counters.rejected += 1;
            warn!(
                session_id = %self.id,
                description = %modification.description,
                conflicts = conflicts.len(),
                "Modification rejected"
            );
            self.emitter.modification_rejected(
                &modification.description,
                conflicts.iter().map(|c| c.to_string()).collect(),
            );
            return Ok(QueueOutcome {
                accepted: false,
                pending_count: session.queue.len(),
                conflicts,
                modification: None,
            });
        }

        let pending_count = session.queue.add(modification.clone());
        session.advance(SessionEvent::QueueModification, &self.emitter)?;
        info!(session_id = %self.id, description = %modification.description, pending_count, "Modification queued");
        self.emitter
            .modification_queued(&modification.id, &modification.description, pending_count);

        Ok(QueueOutcome {
            accepted: true,
            pending_count,
            conflicts,
            modification: Some(modification),
        })
    }

    /// Apply every pending modification as one batch
    ///
    /// Success pushes one history entry and clears the queue. Failure leaves
    /// the plan untouched and keeps the queue so it can be cleared or
    /// retried; the session stays in modifying until one of those happens.
    pub async fn apply_all(&self) -> Result<ApplyOutcome, SessionError> {
        debug!(session_id = %self.id, "TripSession::apply_all: called");
        let mut session = self.acquire()?;
        session.ensure(SessionEvent::Apply)?;
        let plan = session.plan.clone().ok_or(SessionError::NoPlan)?;
        session.advance(SessionEvent::Apply, &self.emitter)?;

        let pending = session.queue.pending().to_vec();
        match self.applier.apply_all(&pending, &plan).await {
            Ok(outcome) => {
                if !pending.is_empty() {
                    session
                        .history
                        .push(HistoryEntry::batch(pending, outcome.plan.clone()));
                    session.plan = Some(outcome.plan.clone());
                    session.queue.clear();
                    session.counters.batches_applied += 1;
                }
                session.advance(SessionEvent::ApplySucceeded, &self.emitter)?;
                Ok(outcome)
            }
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Batch failed, queue retained");
                session.advance(SessionEvent::ApplyFailed, &self.emitter)?;
                Err(e.into())
            }
        }
    }

    /// Step back one history entry; `None` when already at the oldest
    pub async fn undo(&self) -> Result<Option<Plan>, SessionError> {
        debug!(session_id = %self.id, "TripSession::undo: called");
        self.step(SessionEvent::Undo)
    }

    /// Step forward one history entry; `None` when already at the newest
    pub async fn redo(&self) -> Result<Option<Plan>, SessionError> {
        debug!(session_id = %self.id, "TripSession::redo: called");
        self.step(SessionEvent::Redo)
    }

    fn step(&self, event: SessionEvent) -> Result<Option<Plan>, SessionError> {
        let mut session = self.acquire()?;
        session.advance(event, &self.emitter)?;

        let entry = match event {
            SessionEvent::Undo => session.history.undo(),
            _ => session.history.redo(),
        };
        let Some(plan) = entry.map(|e| e.plan.clone()) else {
            debug!(session_id = %self.id, %event, "TripSession::step: nothing to move to");
            return Ok(None);
        };

        session.plan = Some(plan.clone());
        let cursor = session.history.cursor();
        self.emitter.history_moved(event.as_str(), cursor);
        info!(session_id = %self.id, %event, cursor, "History moved");
        Ok(Some(plan))
    }

    /// Discard all pending modifications
    pub async fn clear_queue(&self) -> Result<Vec<Modification>, SessionError> {
        debug!(session_id = %self.id, "TripSession::clear_queue: called");
        let mut session = self.acquire()?;
        session.advance(SessionEvent::ClearQueue, &self.emitter)?;
        Ok(session.queue.clear())
    }

    /// Close the session and return the final plan
    pub async fn finalize(&self) -> Result<Plan, SessionError> {
        debug!(session_id = %self.id, "TripSession::finalize: called");
        let mut session = self.acquire()?;
        session.ensure(SessionEvent::Finalize)?;
        let plan = session.plan.clone().ok_or(SessionError::NoPlan)?;
        session.advance(SessionEvent::Finalize, &self.emitter)?;
        info!(session_id = %self.id, "Session finalized");
        Ok(plan)
    }

    /// Descriptions of the pending modifications
    pub async fn pending_summary(&self) -> Vec<String> {
        self.inner.lock().await.queue.summary()
    }

    /// History labels, the current entry marked
    pub async fn history_summary(&self) -> Vec<String> {
        self.inner.lock().await.history.summary()
    }

    pub async fn state(&self) -> ConversationState {
        self.inner.lock().await.state
    }

    pub async fn plan(&self) -> Option<Plan> {
        self.inner.lock().await.plan.clone()
    }

    pub async fn counters(&self) -> SessionCounters {
        self.inner.lock().await.counters
    }

    /// Copy of the full conversation state
    pub async fn snapshot(&self) -> ConversationSession {
        self.inner.lock().await.clone()
    }
}

impl std::fmt::Debug for TripSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripSession")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeHotelParams, RemoveActivityParams, StageName};
    use crate::events::EventBus;
    use crate::pipeline::EstimateStage;
    use chrono::NaiveDate;

    fn request() -> TripRequest {
        TripRequest::new(
            "Bali, Indonesia",
            NaiveDate::from_ymd_opt(2025, 7, 15).unwrap(),
            NaiveDate::from_ymd_opt(2025, 7, 20).unwrap(),
            15_000_000.0,
            2,
        )
        .unwrap()
    }

    fn session() -> TripSession {
        TripSession::new(
            &Planner::with_defaults(EstimateStage::stage_set()),
            EventEmitter::detached("test"),
        )
    }

    fn change_hotel(max_price: f64) -> ModificationAction {
        ModificationAction::ChangeHotel(ChangeHotelParams {
            max_price: Some(max_price),
            constraint: None,
        })
    }

    #[tokio::test]
    async fn test_run_pipeline_moves_to_reviewing() {
        let session = session();
        session.run_pipeline(request()).await.unwrap();

        assert_eq!(session.state().await, ConversationState::Reviewing);
        assert_eq!(session.history_summary().await, vec!["→ Initial plan".to_string()]);
        assert_eq!(session.counters().await.runs, 1);
    }

    #[tokio::test]
    async fn test_operations_before_plan_are_illegal() {
        let session = session();
        let err = session.apply_all().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::IllegalState {
                state: ConversationState::Idle,
                operation: SessionEvent::Apply
            }
        ));
        assert!(session.queue_modification(change_hotel(500_000.0)).await.is_err());
        assert!(session.undo().await.is_err());
    }

    #[tokio::test]
    async fn test_queue_then_apply() {
        let session = session();
        let (before, _) = session.run_pipeline(request()).await.unwrap();

        let outcome = session.queue_modification(change_hotel(500_000.0)).await.unwrap();
        assert!(outcome.accepted);
        assert_eq!(outcome.pending_count, 1);
        assert_eq!(session.state().await, ConversationState::Modifying);
        assert_eq!(
            session.pending_summary().await,
            vec!["Change hotel (max price: Rp 500,000)".to_string()]
        );

        let applied = session.apply_all().await.unwrap();
        assert_eq!(applied.stages, vec![StageName::Hotel, StageName::Budget, StageName::Itinerary]);
        assert_eq!(session.state().await, ConversationState::Reviewing);
        assert!(session.pending_summary().await.is_empty());
        assert_eq!(session.counters().await.batches_applied, 1);

        let undone = session.undo().await.unwrap().unwrap();
        assert_eq!(undone, before);
        assert!(session.undo().await.unwrap().is_none());
        let redone = session.redo().await.unwrap().unwrap();
        assert_eq!(redone, applied.plan);
    }

    #[tokio::test]
    async fn test_rejected_modification_not_queued() {
        let session = session();
        session.run_pipeline(request()).await.unwrap();

        let outcome = session.queue_modification(change_hotel(50_000.0)).await.unwrap();
        assert!(!outcome.accepted);
        assert_eq!(outcome.pending_count, 0);
        assert!(outcome.conflicts.iter().any(|c| c.is_blocking()));
        assert!(session.pending_summary().await.is_empty());
        assert_eq!(session.state().await, ConversationState::Reviewing);
        assert_eq!(session.counters().await.rejected, 1);
    }

    #[tokio::test]
    async fn test_empty_apply_is_noop() {
        let session = session();
        let (plan, _) = session.run_pipeline(request()).await.unwrap();

        let outcome = session.apply_all().await.unwrap();
        assert_eq!(outcome.plan, plan);
        assert!(outcome.results.is_empty());
        assert_eq!(session.history_summary().await.len(), 1);
        assert_eq!(session.state().await, ConversationState::Reviewing);
    }

    #[tokio::test]
    async fn test_clear_queue_and_finalize() {
        let session = session();
        let (plan, _) = session.run_pipeline(request()).await.unwrap();
        session
            .queue_modification(ModificationAction::RemoveActivity(RemoveActivityParams {
                activity_name: "Culture in Bali".to_string(),
            }))
            .await
            .unwrap();

        let cleared = session.clear_queue().await.unwrap();
        assert_eq!(cleared.len(), 1);
        assert_eq!(session.state().await, ConversationState::Reviewing);

        let finalized = session.finalize().await.unwrap();
        assert_eq!(finalized, plan);
        assert!(session.state().await.is_terminal());
        assert!(session.queue_modification(change_hotel(500_000.0)).await.is_err());
    }

    #[tokio::test]
    async fn test_finalize_with_pending_is_illegal() {
        let session = session();
        session.run_pipeline(request()).await.unwrap();
        session.queue_modification(change_hotel(500_000.0)).await.unwrap();

        let err = session.finalize().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::IllegalState {
                state: ConversationState::Modifying,
                operation: SessionEvent::Finalize
            }
        ));
        assert_eq!(session.pending_summary().await.len(), 1);
    }

    #[tokio::test]
    async fn test_state_changes_are_broadcast() {
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();
        let session = TripSession::new(
            &Planner::with_defaults(EstimateStage::stage_set()),
            bus.emitter_for("s-1"),
        );
        session.run_pipeline(request()).await.unwrap();

        let mut transitions = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.session_id(), "s-1");
            if event.event_type() == "StateChanged" {
                transitions.push(event);
            }
        }
        assert_eq!(transitions.len(), 2);
    }
}
