//! In-process change feed backed by a `tokio::sync::broadcast` channel.
//!
//! Every mutation that goes through the [`Store`](super::Store) facade is
//! published here, giving the admin sync layer the same added / modified /
//! removed notifications the managed store's native feed would deliver.

use serde::Serialize;
use tokio::sync::broadcast;

use super::Document;

/// Default buffer capacity for the broadcast channel. When the buffer is
/// full, slow receivers observe `RecvError::Lagged` and skip ahead.
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// A single document change on one collection.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub collection: String,
    pub kind: ChangeKind,
    pub doc: Document,
}

/// Fan-out hub for [`ChangeEvent`]s. Shared via `Arc` inside the store.
pub struct ChangeHub {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    /// A send error only means there are zero receivers; ignore it.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.sender.send(event);
    }

    pub fn receiver(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A per-collection subscription.
///
/// The first delivery from [`next_batch`](Subscription::next_batch) is the
/// initial snapshot — the collection's current documents as one batch of
/// `Added` records. Every later delivery is a single live change.
pub struct Subscription {
    collection: String,
    initial: Option<Vec<ChangeEvent>>,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    pub(super) fn new(
        collection: &str,
        snapshot: Vec<Document>,
        rx: broadcast::Receiver<ChangeEvent>,
    ) -> Self {
        let initial = snapshot
            .into_iter()
            .map(|doc| ChangeEvent {
                collection: collection.to_string(),
                kind: ChangeKind::Added,
                doc,
            })
            .collect();
        Self {
            collection: collection.to_string(),
            initial: Some(initial),
            rx,
        }
    }

    /// Waits for the next batch of change records.
    /// Returns `None` once the hub is gone (store dropped).
    pub async fn next_batch(&mut self) -> Option<Vec<ChangeEvent>> {
        if let Some(snapshot) = self.initial.take() {
            return Some(snapshot);
        }
        loop {
            match self.rx.recv().await {
                Ok(event) if event.collection == self.collection => return Some(vec![event]),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        collection = %self.collection,
                        skipped,
                        "change subscription lagged"
                    );
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
