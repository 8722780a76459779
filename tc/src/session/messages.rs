//! Session store messages
//!
//! Commands and responses for the store actor.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::oneshot;

use super::trip::TripSession;

/// Errors from store operations
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Channel error")]
    ChannelError,
}

/// Response from store operations
pub type StoreResponse<T> = Result<T, StoreError>;

/// Commands sent to the SessionStore actor
#[derive(Debug)]
pub enum StoreCommand {
    Create {
        reply: oneshot::Sender<StoreResponse<Arc<TripSession>>>,
    },
    Get {
        id: String,
        reply: oneshot::Sender<StoreResponse<Option<Arc<TripSession>>>>,
    },
    Delete {
        id: String,
        reply: oneshot::Sender<StoreResponse<()>>,
    },
    List {
        reply: oneshot::Sender<StoreResponse<Vec<String>>>,
    },
    Count {
        reply: oneshot::Sender<StoreResponse<usize>>,
    },
    CleanupIdle {
        max_idle: chrono::Duration,
        reply: oneshot::Sender<StoreResponse<Vec<String>>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
