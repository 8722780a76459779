//! Event bus for live session observability
//!
//! Pipeline runs, modification queueing, batch application, and state
//! transitions all emit events. Interactive layers subscribe to the bus.
//!
//! ```rust,ignore
//! use tripcraft::events::EventBus;
//!
//! let bus = EventBus::with_default_capacity();
//! let mut rx = bus.subscribe();
//! let emitter = bus.emitter_for("session-1");
//! emitter.run_started("Bali", 7);
//! ```

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter, create_event_bus};
pub use types::{EventLogEntry, TripEvent};
