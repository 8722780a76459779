//! Integration tests for TripCraft
//!
//! End-to-end behavior of sessions over scripted stages.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Notify;

use tripcraft::domain::{
    AddActivityParams, ChangeHotelParams, ModificationAction, Plan, RemoveActivityParams, StageName, StageOutput,
    TripRequest,
};
use tripcraft::events::EventBus;
use tripcraft::pipeline::{
    BudgetCategory, BudgetConstraint, EstimateStage, PipelineContext, PipelineError, Stage, StageExecutionError,
    StageMetadata, StageSet,
};
use tripcraft::session::{ConversationState, Planner, SessionError, SessionStore, TripSession};

// =============================================================================
// Scripted stages
// =============================================================================

/// Wraps an estimate stage; fails once `armed` is set
struct FlakyStage {
    inner: EstimateStage,
    armed: Arc<AtomicBool>,
}

#[async_trait]
impl Stage for FlakyStage {
    fn name(&self) -> StageName {
        self.inner.name()
    }

    async fn execute(
        &self,
        request: &TripRequest,
        context: &PipelineContext,
        budget: &BudgetConstraint,
    ) -> Result<(StageOutput, StageMetadata), StageExecutionError> {
        if self.armed.load(Ordering::SeqCst) {
            return Err(StageExecutionError::failed(self.name(), "upstream unavailable"));
        }
        self.inner.execute(request, context, budget).await
    }
}

/// Wraps an estimate stage; once armed, signals `entered` and waits for `release`
struct GatedStage {
    inner: EstimateStage,
    armed: Arc<AtomicBool>,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl Stage for GatedStage {
    fn name(&self) -> StageName {
        self.inner.name()
    }

    async fn execute(
        &self,
        request: &TripRequest,
        context: &PipelineContext,
        budget: &BudgetConstraint,
    ) -> Result<(StageOutput, StageMetadata), StageExecutionError> {
        if self.armed.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.execute(request, context, budget).await
    }
}

fn bali_request() -> TripRequest {
    TripRequest::new(
        "Bali, Indonesia",
        NaiveDate::from_ymd_opt(2025, 7, 15).unwrap(),
        NaiveDate::from_ymd_opt(2025, 7, 20).unwrap(),
        15_000_000.0,
        2,
    )
    .unwrap()
}

fn store_with(stages: StageSet) -> SessionStore {
    SessionStore::spawn(
        Planner::with_defaults(stages),
        Arc::new(EventBus::with_default_capacity()),
    )
}

async fn planned_session(stages: StageSet) -> (SessionStore, Arc<TripSession>, Plan) {
    let store = store_with(stages);
    let session = store.create().await.unwrap();
    let (plan, _) = session.run_pipeline(bali_request()).await.unwrap();
    (store, session, plan)
}

fn change_hotel(max_price: f64) -> ModificationAction {
    ModificationAction::ChangeHotel(ChangeHotelParams {
        max_price: Some(max_price),
        constraint: None,
    })
}

fn add_activity(activity_type: &str, day: u32) -> ModificationAction {
    ModificationAction::AddActivity(AddActivityParams {
        activity_type: activity_type.to_string(),
        day: Some(day),
    })
}

fn remove_activity(name: &str) -> ModificationAction {
    ModificationAction::RemoveActivity(RemoveActivityParams {
        activity_name: name.to_string(),
    })
}

// =============================================================================
// Planning
// =============================================================================

#[tokio::test]
async fn test_fifteen_million_scenario() {
    let store = store_with(EstimateStage::stage_set());
    let session = store.create().await.unwrap();
    let (plan, metadata) = session.run_pipeline(bali_request()).await.unwrap();

    let allocation = &metadata.allocation;
    assert_eq!(allocation.amount(BudgetCategory::Flight), 5_250_000.0);
    assert_eq!(allocation.amount(BudgetCategory::Hotel), 4_500_000.0);
    assert_eq!(allocation.amount(BudgetCategory::Food), 3_000_000.0);
    assert_eq!(allocation.amount(BudgetCategory::Activities), 1_500_000.0);
    assert_eq!(allocation.amount(BudgetCategory::Misc), 750_000.0);

    let queued = session.queue_modification(change_hotel(500_000.0)).await.unwrap();
    assert!(queued.accepted);
    assert_eq!(
        queued.modification.unwrap().affected_stages,
        vec![StageName::Hotel, StageName::Budget, StageName::Itinerary]
    );

    let outcome = session.apply_all().await.unwrap();
    assert_eq!(outcome.stages, vec![StageName::Hotel, StageName::Budget, StageName::Itinerary]);
    for untouched in [StageName::Destination, StageName::Flight, StageName::Dining] {
        assert!(
            Arc::ptr_eq(outcome.plan.output(untouched).unwrap(), plan.output(untouched).unwrap()),
            "{untouched} should be shared"
        );
    }
    assert_eq!(
        outcome.plan.output(StageName::Hotel).unwrap().number("nightly_rate"),
        Some(500_000.0)
    );
}

#[tokio::test]
async fn test_run_failure_carries_progress_and_returns_to_idle() {
    let armed = Arc::new(AtomicBool::new(true));
    let stages = EstimateStage::stage_set().with(Arc::new(FlakyStage {
        inner: EstimateStage::new(StageName::Dining),
        armed,
    }));
    let store = store_with(stages);
    let session = store.create().await.unwrap();

    let err = session.run_pipeline(bali_request()).await.unwrap_err();
    let SessionError::Pipeline(PipelineError::StageFailed {
        stage,
        ordinal,
        total,
        progress,
        ..
    }) = &err
    else {
        panic!("expected stage failure, got {err:?}");
    };
    assert_eq!(*stage, StageName::Dining);
    assert_eq!((*ordinal, *total), (4, 7));
    assert_eq!(progress.completed(), 3);
    assert!(err.to_string().contains("Stage 4/7 (dining) failed"));

    assert_eq!(session.state().await, ConversationState::Idle);
    assert!(session.plan().await.is_none());
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test]
async fn test_failed_batch_leaves_plan_unchanged() {
    let armed = Arc::new(AtomicBool::new(false));
    let stages = EstimateStage::stage_set().with(Arc::new(FlakyStage {
        inner: EstimateStage::new(StageName::Budget),
        armed: armed.clone(),
    }));
    let (_store, session, plan) = planned_session(stages).await;
    let before = serde_json::to_string(&plan).unwrap();

    session.queue_modification(change_hotel(500_000.0)).await.unwrap();
    session.queue_modification(add_activity("snorkeling", 3)).await.unwrap();
    armed.store(true, Ordering::SeqCst);

    let err = session.apply_all().await.unwrap_err();
    let SessionError::Apply(apply) = &err else {
        panic!("expected apply error, got {err:?}");
    };
    assert_eq!(apply.results.len(), 2);
    assert!(apply.results.iter().all(|r| !r.success));

    let after = session.plan().await.unwrap();
    assert_eq!(serde_json::to_string(&after).unwrap(), before);
    assert_eq!(session.pending_summary().await.len(), 2);
    assert_eq!(session.history_summary().await.len(), 1);
    assert_eq!(session.state().await, ConversationState::Modifying);

    // Retry once the stage recovers
    armed.store(false, Ordering::SeqCst);
    let outcome = session.apply_all().await.unwrap();
    assert_eq!(outcome.results.len(), 2);
    assert!(session.pending_summary().await.is_empty());
    assert_eq!(session.state().await, ConversationState::Reviewing);
}

#[tokio::test]
async fn test_failed_batch_blocks_finalize_until_cleared() {
    let armed = Arc::new(AtomicBool::new(false));
    let stages = EstimateStage::stage_set().with(Arc::new(FlakyStage {
        inner: EstimateStage::new(StageName::Budget),
        armed: armed.clone(),
    }));
    let (_store, session, plan) = planned_session(stages).await;

    session.queue_modification(change_hotel(500_000.0)).await.unwrap();
    armed.store(true, Ordering::SeqCst);
    assert!(session.apply_all().await.is_err());

    let err = session.finalize().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::IllegalState {
            state: ConversationState::Modifying,
            ..
        }
    ));
    assert_eq!(
        session.pending_summary().await,
        vec!["Change hotel (max price: Rp 500,000)".to_string()]
    );
    assert!(!session.state().await.is_terminal());

    assert_eq!(session.clear_queue().await.unwrap().len(), 1);
    assert_eq!(session.finalize().await.unwrap(), plan);
}

#[tokio::test]
async fn test_empty_apply_returns_unchanged_plan() {
    let (_store, session, plan) = planned_session(EstimateStage::stage_set()).await;

    let outcome = session.apply_all().await.unwrap();
    assert_eq!(outcome.plan, plan);
    assert!(outcome.results.is_empty());
    assert_eq!(session.counters().await.batches_applied, 0);
}

#[tokio::test]
async fn test_queued_hotel_ceiling_is_always_priceable() {
    let (_store, session, _plan) = planned_session(EstimateStage::stage_set()).await;

    let below = session.queue_modification(change_hotel(149_999.0)).await.unwrap();
    assert!(!below.accepted);
    assert!(session.pending_summary().await.is_empty());

    let at_floor = session.queue_modification(change_hotel(150_000.0)).await.unwrap();
    assert!(at_floor.accepted);
    let outcome = session.apply_all().await.unwrap();
    let hotel = outcome.plan.output(StageName::Hotel).unwrap();
    assert!(!hotel.is_degraded());
    assert_eq!(hotel.number("nightly_rate"), Some(150_000.0));
    assert!(outcome.results.iter().all(|r| r.success));
}

#[tokio::test]
async fn test_rejected_modification_never_pending() {
    let (_store, session, _plan) = planned_session(EstimateStage::stage_set()).await;

    session.queue_modification(add_activity("snorkeling", 3)).await.unwrap();
    let blocked_by_floor = session.queue_modification(change_hotel(40_000.0)).await.unwrap();
    assert!(!blocked_by_floor.accepted);
    assert!(
        blocked_by_floor
            .conflicts
            .iter()
            .any(|c| c.suggestions.iter().any(|s| s.contains("Increase max price")))
    );

    let blocked_by_pending = session
        .queue_modification(remove_activity("Snorkeling activity"))
        .await
        .unwrap();
    assert!(!blocked_by_pending.accepted);
    assert_eq!(blocked_by_pending.pending_count, 1);

    let pending = session.pending_summary().await;
    assert_eq!(pending, vec!["Add snorkeling activity on Day 3".to_string()]);
    assert_eq!(session.counters().await.rejected, 2);
}

// =============================================================================
// History
// =============================================================================

#[tokio::test]
async fn test_undo_all_batches_returns_initial_plan() {
    let (_store, session, initial) = planned_session(EstimateStage::stage_set()).await;

    let batches = [
        change_hotel(500_000.0),
        add_activity("snorkeling", 3),
        remove_activity("Sightseeing in Bali"),
    ];
    let mut final_plan = None;
    for action in batches.iter().cloned() {
        session.queue_modification(action).await.unwrap();
        final_plan = Some(session.apply_all().await.unwrap().plan);
    }
    let final_plan = final_plan.unwrap();
    assert_eq!(session.history_summary().await.len(), 4);

    for _ in 0..batches.len() {
        assert!(session.undo().await.unwrap().is_some());
    }
    assert_eq!(session.plan().await.unwrap(), initial);
    assert!(session.undo().await.unwrap().is_none());

    for _ in 0..batches.len() {
        assert!(session.redo().await.unwrap().is_some());
    }
    assert_eq!(session.plan().await.unwrap(), final_plan);
    assert!(session.redo().await.unwrap().is_none());
}

#[tokio::test]
async fn test_new_batch_after_undo_discards_redo() {
    let (_store, session, _initial) = planned_session(EstimateStage::stage_set()).await;

    session.queue_modification(change_hotel(500_000.0)).await.unwrap();
    session.apply_all().await.unwrap();
    session.undo().await.unwrap();

    session.queue_modification(add_activity("surfing", 2)).await.unwrap();
    session.apply_all().await.unwrap();

    let history = session.history_summary().await;
    assert_eq!(
        history,
        vec![
            "  Initial plan".to_string(),
            "→ Add surfing activity on Day 2".to_string()
        ]
    );
    assert!(session.redo().await.unwrap().is_none());
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_apply_one_is_busy() {
    let armed = Arc::new(AtomicBool::new(false));
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let stages = EstimateStage::stage_set().with(Arc::new(GatedStage {
        inner: EstimateStage::new(StageName::Hotel),
        armed: armed.clone(),
        entered: entered.clone(),
        release: release.clone(),
    }));
    let (_store, session, _plan) = planned_session(stages).await;

    session.queue_modification(change_hotel(500_000.0)).await.unwrap();
    armed.store(true, Ordering::SeqCst);

    let first = {
        let session = session.clone();
        tokio::spawn(async move { session.apply_all().await })
    };
    entered.notified().await;

    let second = session.apply_all().await;
    assert!(matches!(second, Err(SessionError::Busy)));
    assert!(matches!(session.undo().await, Err(SessionError::Busy)));

    release.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert_eq!(outcome.results.len(), 1);

    assert_eq!(session.counters().await.batches_applied, 1);
    assert_eq!(session.history_summary().await.len(), 2);
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let bus = Arc::new(EventBus::with_default_capacity());
    let mut rx = bus.subscribe();
    let store = SessionStore::spawn(Planner::with_defaults(EstimateStage::stage_set()), bus);

    let a = store.create().await.unwrap();
    let b = store.create().await.unwrap();
    let (ra, rb) = tokio::join!(a.run_pipeline(bali_request()), b.run_pipeline(bali_request()));
    let (plan_a, _) = ra.unwrap();
    rb.unwrap();

    a.queue_modification(change_hotel(500_000.0)).await.unwrap();
    a.apply_all().await.unwrap();

    assert_eq!(b.plan().await.unwrap().output(StageName::Hotel), plan_a.output(StageName::Hotel));
    assert_eq!(b.history_summary().await.len(), 1);
    assert_eq!(a.history_summary().await.len(), 2);

    let mut seen_a = 0;
    let mut seen_b = 0;
    while let Ok(event) = rx.try_recv() {
        match event.session_id() {
            id if id == a.id() => seen_a += 1,
            id if id == b.id() => seen_b += 1,
            other => panic!("event for unknown session {other}"),
        }
    }
    assert!(seen_a > seen_b);
    assert!(seen_b > 0);
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_many_sessions_plan_concurrently() {
    let store = store_with(EstimateStage::stage_set());
    let mut sessions = Vec::new();
    for _ in 0..5 {
        sessions.push(store.create().await.unwrap());
    }

    let results = futures::future::join_all(sessions.iter().map(|s| s.run_pipeline(bali_request()))).await;
    assert!(results.iter().all(|r| r.is_ok()));

    for session in &sessions {
        assert_eq!(session.state().await, ConversationState::Reviewing);
    }
    assert_eq!(store.list().await.unwrap().len(), 5);
}
