//! # Per-subscriber queues fed from the event bus.
//!
//! Every subscriber owns a bounded queue drained by its own task, so a slow catalog
//! write never holds up the log writer (or the bus listener feeding both).
//!
//! ```text
//! bus listener ──► emit(event)
//!                     ├──► [log queue]     ──► LogWriter::on_event
//!                     ├──► [catalog queue] ──► CatalogWriter::on_event
//!                     └──► [user queue]    ──► ...
//! ```
//!
//! A full queue drops the event for that subscriber alone and publishes
//! `SubscriberOverflow`; a panic inside `on_event` is caught, published as
//! `SubscriberPanicked` and the queue keeps draining. Order is FIFO per subscriber
//! only.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct Queue {
    subscriber: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Fan-out of bus events to the registered subscribers.
pub struct SubscriberSet {
    queues: Vec<Queue>,
    drains: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Starts one drain task per subscriber. Requires a Tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (queues, drains) = subs
            .into_iter()
            .map(|sub| {
                let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let queue = Queue {
                    subscriber: sub.name(),
                    tx,
                };
                (queue, tokio::spawn(drain(sub, rx, bus.clone())))
            })
            .unzip();
        Self {
            queues,
            drains,
            bus,
        }
    }

    /// Queues `event` for every subscriber without waiting.
    pub fn emit(&self, event: Event) {
        let event = Arc::new(event);
        for queue in &self.queues {
            let reason = match queue.tx.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            // An overflow notice that overflows is not reported again.
            if event.kind != EventKind::SubscriberOverflow {
                self.bus
                    .publish(Event::subscriber_overflow(queue.subscriber, reason));
            }
        }
    }

    /// Closes the queues and waits until every subscriber has drained its backlog.
    pub async fn shutdown(self) {
        drop(self.queues);
        for drain in self.drains {
            let _ = drain.await;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

async fn drain(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(event) = rx.recv().await {
        let delivered = AssertUnwindSafe(sub.on_event(&event)).catch_unwind().await;
        if let Err(payload) = delivered {
            let info = describe_panic(payload.as_ref());
            tracing::error!(subscriber = sub.name(), %info, "subscriber panicked");
            bus.publish(Event::subscriber_panicked(sub.name(), info));
        }
    }
}

fn describe_panic(payload: &(dyn Any + Send)) -> String {
    match (payload.downcast_ref::<&str>(), payload.downcast_ref::<String>()) {
        (Some(msg), _) => (*msg).to_string(),
        (_, Some(msg)) => msg.clone(),
        _ => "unknown panic".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().push(ev.kind);
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Exploder;

    #[async_trait]
    impl Subscribe for Exploder {
        async fn on_event(&self, _ev: &Event) {
            panic!("boom");
        }
        fn name(&self) -> &'static str {
            "exploder"
        }
    }

    struct Stalled;

    #[async_trait]
    impl Subscribe for Stalled {
        async fn on_event(&self, _ev: &Event) {
            std::future::pending::<()>().await;
        }
        fn name(&self) -> &'static str {
            "stalled"
        }
        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn test_each_subscriber_sees_events_in_order() {
        let rec = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![rec.clone() as Arc<dyn Subscribe>], Bus::new(16));

        set.emit(Event::new(EventKind::WorkerStarting));
        set.emit(Event::new(EventKind::WorkerRunning));
        set.shutdown().await;

        assert_eq!(
            *rec.0.lock(),
            vec![EventKind::WorkerStarting, EventKind::WorkerRunning]
        );
    }

    #[tokio::test]
    async fn test_panic_is_isolated_and_published() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let rec = Arc::new(Recorder::default());
        let set = SubscriberSet::new(
            vec![Arc::new(Exploder) as Arc<dyn Subscribe>, rec.clone() as _],
            bus,
        );

        set.emit(Event::new(EventKind::WorkerStopped));
        set.shutdown().await;

        let ev = rx.recv().await.unwrap();
        assert!(ev.is_subscriber_panic());
        assert_eq!(ev.worker.as_deref(), Some("exploder"));
        assert_eq!(ev.reason.as_deref(), Some("boom"));
        assert_eq!(*rec.0.lock(), vec![EventKind::WorkerStopped]);
    }

    #[tokio::test]
    async fn test_full_queue_reports_overflow() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(vec![Arc::new(Stalled) as Arc<dyn Subscribe>], bus);

        // One event is held by on_event, one fills the queue, the third overflows.
        for _ in 0..3 {
            set.emit(Event::new(EventKind::BackoffScheduled));
            tokio::task::yield_now().await;
        }

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberOverflow);
        assert_eq!(ev.worker.as_deref(), Some("stalled"));
    }
}
