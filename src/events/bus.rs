//! # Broadcast channel shared by every event producer.
//!
//! ```text
//!   camera workers ──┐
//!   maintenance   ───┼──► Bus ──► subscriber listener ──► SubscriberSet
//!   fleet         ───┘            (spawned by FleetBuilder)
//! ```
//!
//! Publishing never blocks. The ring buffer is bounded by `bus_capacity`; a receiver
//! that falls behind sees `RecvError::Lagged` and resumes at the oldest retained
//! event. Events published while nobody listens are gone.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable handle onto the fleet's event channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Fire-and-forget; dropped when there are no receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
