//! SessionStore - actor that owns every session
//!
//! Processes commands via channels. The actor only hands out `Arc`s to
//! sessions; runs and batches execute on the caller's task, so a slow
//! stage in one session never stalls the store or another session.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::messages::{StoreCommand, StoreError, StoreResponse};
use super::planner::Planner;
use super::trip::TripSession;
use crate::domain::generate_id;
use crate::events::{EventBus, TripEvent};

/// Handle to the session store actor
#[derive(Clone)]
pub struct SessionStore {
    tx: mpsc::Sender<StoreCommand>,
    bus: Arc<EventBus>,
}

impl SessionStore {
    /// Spawn a new SessionStore actor
    pub fn spawn(planner: Planner, bus: Arc<EventBus>) -> Self {
        debug!("SessionStore::spawn: called");
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(planner, bus.clone(), rx));
        info!("SessionStore spawned");
        Self { tx, bus }
    }

    /// Subscribe to events of every session
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<TripEvent> {
        self.bus.subscribe()
    }

    /// Create a new, idle session
    pub async fn create(&self) -> StoreResponse<Arc<TripSession>> {
        debug!("SessionStore::create: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Create { reply: reply_tx })
            .await
            .map_err(|_| StoreError::ChannelError)?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)?
    }

    /// Get a session by ID
    pub async fn get(&self, id: &str) -> StoreResponse<Option<Arc<TripSession>>> {
        debug!(%id, "SessionStore::get: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Get {
                id: id.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| StoreError::ChannelError)?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)?
    }

    /// Get a session, failing if it does not exist
    pub async fn get_required(&self, id: &str) -> StoreResponse<Arc<TripSession>> {
        self.get(id).await?.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Remove a session
    pub async fn delete(&self, id: &str) -> StoreResponse<()> {
        debug!(%id, "SessionStore::delete: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Delete {
                id: id.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| StoreError::ChannelError)?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)?
    }

    /// IDs of all sessions, sorted
    pub async fn list(&self) -> StoreResponse<Vec<String>> {
        debug!("SessionStore::list: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::List { reply: reply_tx })
            .await
            .map_err(|_| StoreError::ChannelError)?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)?
    }

    pub async fn count(&self) -> StoreResponse<usize> {
        debug!("SessionStore::count: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Count { reply: reply_tx })
            .await
            .map_err(|_| StoreError::ChannelError)?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)?
    }

    /// Drop sessions idle longer than `max_idle`; returns the removed IDs
    pub async fn cleanup_idle(&self, max_idle: chrono::Duration) -> StoreResponse<Vec<String>> {
        debug!(max_idle_secs = max_idle.num_seconds(), "SessionStore::cleanup_idle: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::CleanupIdle {
                max_idle,
                reply: reply_tx,
            })
            .await
            .map_err(|_| StoreError::ChannelError)?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)?
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> StoreResponse<()> {
        debug!("SessionStore::shutdown: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Shutdown { reply: reply_tx })
            .await
            .map_err(|_| StoreError::ChannelError)?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

/// Actor loop that processes commands
async fn actor_loop(planner: Planner, bus: Arc<EventBus>, mut rx: mpsc::Receiver<StoreCommand>) {
    debug!("actor_loop: called");
    let mut sessions: HashMap<String, Arc<TripSession>> = HashMap::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StoreCommand::Create { reply } => {
                let id = generate_id("session", "");
                debug!(%id, "actor_loop: Create command");
                let session = Arc::new(TripSession::new(&planner, bus.emitter_for(&id)));
                sessions.insert(id.clone(), session.clone());
                info!(%id, total = sessions.len(), "Session created");
                let _ = reply.send(Ok(session));
            }

            StoreCommand::Get { id, reply } => {
                debug!(%id, "actor_loop: Get command");
                let _ = reply.send(Ok(sessions.get(&id).cloned()));
            }

            StoreCommand::Delete { id, reply } => {
                debug!(%id, "actor_loop: Delete command");
                let result = match sessions.remove(&id) {
                    Some(_) => {
                        info!(%id, "Session deleted");
                        Ok(())
                    }
                    None => Err(StoreError::NotFound(id)),
                };
                let _ = reply.send(result);
            }

            StoreCommand::List { reply } => {
                debug!("actor_loop: List command");
                let mut ids: Vec<String> = sessions.keys().cloned().collect();
                ids.sort();
                let _ = reply.send(Ok(ids));
            }

            StoreCommand::Count { reply } => {
                debug!("actor_loop: Count command");
                let _ = reply.send(Ok(sessions.len()));
            }

            StoreCommand::CleanupIdle { max_idle, reply } => {
                debug!("actor_loop: CleanupIdle command");
                let mut removed: Vec<String> = sessions
                    .iter()
                    .filter(|(_, s)| s.idle_for() > max_idle)
                    .map(|(id, _)| id.clone())
                    .collect();
                removed.sort();
                for id in &removed {
                    sessions.remove(id);
                }
                if !removed.is_empty() {
                    info!(count = removed.len(), "Removed idle sessions");
                }
                let _ = reply.send(Ok(removed));
            }

            StoreCommand::Shutdown { reply } => {
                info!(sessions = sessions.len(), "SessionStore shutting down");
                let _ = reply.send(());
                break;
            }
        }
    }

    debug!("SessionStore actor stopped");
}
