//! Event Bus - pub/sub for session activity
//!
//! Uses a tokio broadcast channel. Components emit events; interactive
//! layers subscribe. Emitting never blocks and never fails.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::TripEvent;
use crate::domain::StageName;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// Central event bus for session activity
pub struct EventBus {
    tx: broadcast::Sender<TripEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// Fire-and-forget: with no subscribers the event is dropped; when the
    /// channel is full the oldest events are dropped.
    pub fn emit(&self, event: TripEvent) {
        debug!(
            event_type = event.event_type(),
            session_id = event.session_id(),
            "EventBus::emit"
        );
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<TripEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter handle bound to a session
    pub fn emitter_for(&self, session_id: impl Into<String>) -> EventEmitter {
        let session_id = session_id.into();
        debug!(%session_id, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            tx: Some(self.tx.clone()),
            session_id,
        }
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Handle for components to emit events without owning the bus
///
/// Cheap to clone. A detached emitter silently discards everything.
#[derive(Clone, Debug)]
pub struct EventEmitter {
    tx: Option<broadcast::Sender<TripEvent>>,
    session_id: String,
}

impl EventEmitter {
    /// An emitter that is not connected to any bus
    pub fn detached(session_id: impl Into<String>) -> Self {
        Self {
            tx: None,
            session_id: session_id.into(),
        }
    }

    /// Session ID this emitter is bound to
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Emit a raw event
    pub fn emit(&self, event: TripEvent) {
        if let Some(tx) = &self.tx {
            debug!(event_type = event.event_type(), "EventEmitter::emit");
            let _ = tx.send(event);
        }
    }

    // === Convenience methods ===

    pub fn run_started(&self, destination: &str, total_stages: usize) {
        self.emit(TripEvent::RunStarted {
            session_id: self.session_id.clone(),
            destination: destination.to_string(),
            total_stages,
        });
    }

    pub fn stage_started(&self, stage: StageName, ordinal: usize, total: usize) {
        self.emit(TripEvent::StageStarted {
            session_id: self.session_id.clone(),
            stage,
            ordinal,
            total,
        });
    }

    pub fn stage_completed(&self, stage: StageName, ordinal: usize, total: usize, summary: &str, confidence: f64) {
        self.emit(TripEvent::StageCompleted {
            session_id: self.session_id.clone(),
            stage,
            ordinal,
            total,
            summary: summary.to_string(),
            confidence,
        });
    }

    pub fn stage_failed(&self, stage: StageName, ordinal: usize, total: usize, message: &str) {
        self.emit(TripEvent::StageFailed {
            session_id: self.session_id.clone(),
            stage,
            ordinal,
            total,
            message: message.to_string(),
        });
    }

    pub fn run_completed(&self, success: bool, overall_confidence: f64) {
        self.emit(TripEvent::RunCompleted {
            session_id: self.session_id.clone(),
            success,
            overall_confidence,
        });
    }

    pub fn modification_queued(&self, modification_id: &str, description: &str, pending: usize) {
        self.emit(TripEvent::ModificationQueued {
            session_id: self.session_id.clone(),
            modification_id: modification_id.to_string(),
            description: description.to_string(),
            pending,
        });
    }

    pub fn modification_rejected(&self, description: &str, conflicts: Vec<String>) {
        self.emit(TripEvent::ModificationRejected {
            session_id: self.session_id.clone(),
            description: description.to_string(),
            conflicts,
        });
    }

    pub fn batch_applied(&self, modifications: usize, stages: Vec<StageName>, success: bool) {
        self.emit(TripEvent::BatchApplied {
            session_id: self.session_id.clone(),
            modifications,
            stages,
            success,
        });
    }

    pub fn history_moved(&self, direction: &str, cursor: i64) {
        self.emit(TripEvent::HistoryMoved {
            session_id: self.session_id.clone(),
            direction: direction.to_string(),
            cursor,
        });
    }

    pub fn state_changed(&self, from: &str, to: &str) {
        self.emit(TripEvent::StateChanged {
            session_id: self.session_id.clone(),
            from: from.to_string(),
            to: to.to_string(),
        });
    }
}

/// Create an event bus wrapped in an Arc for shared ownership
pub fn create_event_bus(capacity: usize) -> Arc<EventBus> {
    Arc::new(EventBus::new(capacity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_event_bus_subscribe() {
        let bus = EventBus::new(100);
        assert_eq!(bus.subscriber_count(), 0);
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_bus_no_subscribers() {
        let bus = EventBus::new(100);
        bus.emit(TripEvent::RunCompleted {
            session_id: "sess".to_string(),
            success: true,
            overall_confidence: 1.0,
        });
    }

    #[tokio::test]
    async fn test_event_emitter() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for("sess-456");

        emitter.run_started("Bali", 7);
        emitter.stage_started(StageName::Destination, 1, 7);
        emitter.stage_completed(StageName::Destination, 1, 7, "Researched Bali", 0.9);

        let event = rx.recv().await.unwrap();
        match event {
            TripEvent::RunStarted {
                destination,
                total_stages,
                ..
            } => {
                assert_eq!(destination, "Bali");
                assert_eq!(total_stages, 7);
            }
            _ => panic!("Expected RunStarted event"),
        }
        for _ in 0..2 {
            assert_eq!(rx.recv().await.unwrap().session_id(), "sess-456");
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_detached_emitter_discards() {
        let emitter = EventEmitter::detached("sess");
        emitter.run_completed(false, 0.0);
        assert_eq!(emitter.session_id(), "sess");
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = create_event_bus(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emitter_for("test").history_moved("undo", 0);

        assert_eq!(rx1.recv().await.unwrap().event_type(), "HistoryMoved");
        assert_eq!(rx2.recv().await.unwrap().event_type(), "HistoryMoved");
    }
}
