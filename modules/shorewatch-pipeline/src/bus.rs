//! In-process notification fanout.
//!
//! A thin wrapper over a tokio broadcast channel. Publishing is
//! fire-and-forget: it never blocks, never fails the caller, and a slow or
//! absent observer costs the publisher nothing. A subscriber that falls more
//! than `capacity` events behind skips the gap and keeps going.

use tokio::sync::broadcast;
use tracing::{debug, warn};

use shorewatch_common::events::Event;

#[derive(Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<Event>,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Deliver an event to every current subscriber, best effort. With no
    /// subscribers the event is dropped.
    pub fn publish(&self, event: Event) {
        debug!(kind = event.kind(), "Publishing event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> Subscriber {
        Subscriber {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

pub struct Subscriber {
    rx: broadcast::Receiver<Event>,
}

impl Subscriber {
    /// Next event, in publish order. Skips over any gap left by lagging,
    /// with a warning. Returns None once the bus is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Subscriber lagged, skipping missed events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-buffered event, without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "Subscriber lagged, skipping missed events");
                }
                Err(_) => return None,
            }
        }
    }
}
