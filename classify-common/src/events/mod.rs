//! Event bus for collection state transitions
//!
//! Every state transition of a collection (staging, commit, enrichment,
//! removal) is published once on the bus. Consumers (the SSE transport,
//! event loggers, tests) subscribe and drain their own queue in order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Kind of transition carried by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Item entered the buffer or the item store
    Add,
    /// Item changed in place (new raw input, enrichment results, match)
    Update,
    /// Item left the buffer or the item store
    Remove,
}

impl EventStatus {
    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Add => "add",
            EventStatus::Update => "update",
            EventStatus::Remove => "remove",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Ordered, non-blocking publish queue
///
/// Each subscriber owns an unbounded FIFO queue:
/// - Producers never block and never lose events for a live subscriber
/// - A subscriber observes events in publish order
/// - No replay: a subscriber only sees events published after it subscribed
/// - Dropped subscribers are pruned on the next publish
///
/// # Examples
///
/// ```
/// use classify_common::events::EventBus;
///
/// let bus: EventBus<String> = EventBus::new();
/// let mut sub = bus.subscribe();
///
/// bus.emit("first".to_string());
/// bus.emit("second".to_string());
///
/// assert_eq!(sub.try_recv().as_deref(), Some("first"));
/// assert_eq!(sub.try_recv().as_deref(), Some("second"));
/// ```
pub struct EventBus<E> {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<E>>>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<E: Clone + Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + 'static> EventBus<E> {
    /// Creates a bus with no subscribers
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> EventSubscription<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        EventSubscription { rx }
    }

    /// Publish an event to every live subscriber
    ///
    /// Returns the number of subscribers the event was queued for. Zero
    /// subscribers is not an error: the event is simply not observed.
    pub fn emit(&self, event: E) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    /// Get the current number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<E>>> {
        // A panicking publisher cannot leave the sender list half-updated
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One consumer's view of the bus
pub struct EventSubscription<E> {
    rx: mpsc::UnboundedReceiver<E>,
}

impl<E: Send + 'static> EventSubscription<E> {
    /// Wait for the next event
    ///
    /// Returns `None` once every bus handle has been dropped and the queue
    /// is drained.
    pub async fn recv(&mut self) -> Option<E> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting
    pub fn try_recv(&mut self) -> Option<E> {
        self.rx.try_recv().ok()
    }

    /// Drain everything currently queued
    pub fn drain(&mut self) -> Vec<E> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Convert into a stream, for transports that forward events
    pub fn into_stream(mut self) -> impl futures::Stream<Item = E> + Send {
        async_stream::stream! {
            while let Some(event) = self.rx.recv().await {
                yield event;
            }
        }
    }
}
