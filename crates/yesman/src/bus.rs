// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event Bus (C8): process-wide, in-process publish/subscribe. Fan-out is
//! lock-free on the publish path (the subscriber list lives behind an
//! `arc-swap`, copy-on-write on subscribe/unsubscribe); each subscriber owns
//! a bounded queue so a slow consumer never blocks the publisher or other
//! subscribers. A subscriber that falls behind its queue depth is dropped,
//! never the messages meant for someone else.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::mpsc;

use crate::event::Event;

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<Event>,
}

/// A live subscription. Dropping it unsubscribes automatically.
pub struct Subscription {
    id: u64,
    bus: Arc<Inner>,
    rx: mpsc::Receiver<Event>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Await the next event. Returns `None` once the bus has dropped this
    /// subscriber (lagged) or the bus itself has been dropped.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.remove(self.id);
    }
}

struct Inner {
    subscribers: ArcSwap<Vec<Subscriber>>,
    next_id: AtomicU64,
    queue_depth: usize,
}

impl Inner {
    fn remove(&self, id: u64) {
        self.subscribers.rcu(|current| {
            current.iter().filter(|s| s.id != id).map(|s| Subscriber { id: s.id, tx: s.tx.clone() }).collect::<Vec<_>>()
        });
    }
}

/// Process-wide pub/sub hub. Cheap to clone — all clones share the same
/// subscriber list.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new(queue_depth: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: ArcSwap::from_pointee(Vec::new()),
                next_id: AtomicU64::new(1),
                queue_depth,
            }),
        }
    }

    /// Register a new subscriber with its own bounded queue.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.queue_depth);
        self.inner.subscribers.rcu(|current| {
            let mut next: Vec<Subscriber> =
                current.iter().map(|s| Subscriber { id: s.id, tx: s.tx.clone() }).collect();
            next.push(Subscriber { id, tx: tx.clone() });
            next
        });
        Subscription { id, bus: Arc::clone(&self.inner), rx }
    }

    /// Publish `event` to every current subscriber. Non-blocking: a
    /// subscriber whose queue is full is dropped (and, unless the event
    /// itself announces a lag, a `SubscriberLagged` event is published for
    /// it) rather than stalling delivery to everyone else.
    pub fn publish(&self, event: Event) {
        let subscribers = self.inner.subscribers.load();
        let mut lagged = Vec::new();

        for sub in subscribers.iter() {
            match sub.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) | Err(mpsc::error::TrySendError::Closed(_)) => {
                    lagged.push(sub.id);
                }
            }
        }

        if lagged.is_empty() {
            return;
        }

        self.inner.subscribers.rcu(|current| {
            current
                .iter()
                .filter(|s| !lagged.contains(&s.id))
                .map(|s| Subscriber { id: s.id, tx: s.tx.clone() })
                .collect::<Vec<_>>()
        });

        if !matches!(event, Event::SubscriberLagged { .. }) {
            for id in lagged {
                self.publish(Event::subscriber_lagged(id));
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.load().len()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
