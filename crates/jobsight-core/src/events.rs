//! Document change feed and subscription plumbing.
//!
//! A [`ChangeFeed`] is the in-process broadcast of "document added" events.
//! A [`ChangeSubscription`] is what a listener consumes: a bounded channel
//! fed by an adapter task owned by the store, plus the cancellation token
//! that stops that adapter. Dropping or unsubscribing the subscription stops
//! delivery without waiting for anything in flight.

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::models::{Collection, Document};

// ============================================================================
// Change feed
// ============================================================================

/// Broadcast bus of newly added documents across all collections.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Document>,
}

impl ChangeFeed {
    /// Create a feed with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an added document to all subscribers.
    ///
    /// With no active subscribers the event is dropped; subscriptions catch
    /// up through their initial snapshot instead.
    pub fn publish(&self, document: Document) {
        tracing::debug!(
            collection = %document.collection,
            record_id = %document.id,
            subscriber_count = self.tx.receiver_count(),
            "ChangeFeed publish"
        );
        let _ = self.tx.send(document);
    }

    /// Subscribe to every published document.
    pub fn subscribe(&self) -> broadcast::Receiver<Document> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Consumer side of a collection subscription.
pub struct ChangeSubscription {
    collection: Collection,
    receiver: mpsc::Receiver<Document>,
    cancel: CancellationToken,
}

/// Producer side handed to the store's adapter task.
#[derive(Clone)]
pub struct SubscriptionSender {
    tx: mpsc::Sender<Document>,
    cancel: CancellationToken,
}

impl ChangeSubscription {
    /// Create a linked subscription/sender pair.
    pub fn channel(collection: Collection, capacity: usize) -> (SubscriptionSender, Self) {
        let (tx, receiver) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        (
            SubscriptionSender {
                tx,
                cancel: cancel.clone(),
            },
            Self {
                collection,
                receiver,
                cancel,
            },
        )
    }

    /// Collection this subscription watches.
    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Wait for the next added document; `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<Document> {
        self.receiver.recv().await
    }

    /// Stop delivery. Buffered events are discarded.
    pub fn unsubscribe(&mut self) {
        self.cancel.cancel();
        self.receiver.close();
    }

    /// Whether the subscription has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl SubscriptionSender {
    /// Deliver one document. Returns `false` once the subscriber is gone,
    /// which tells the adapter task to exit.
    pub async fn send(&self, document: Document) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(document) => sent.is_ok(),
        }
    }

    /// Resolves when the subscriber unsubscribes or is dropped.
    pub async fn closed(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.tx.closed() => {}
        }
    }

    /// Whether the subscriber is gone.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }
}

// ============================================================================
// Tests
// ============================================================================
