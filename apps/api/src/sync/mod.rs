//! Admin console synchronization layer.
//!
//! Keeps an admin session's view of the store consistent through three
//! mechanisms at once: an initial bulk load, per-collection change-feed
//! subscriptions, and a fixed-interval poll as a fallback for missed
//! deliveries. User-facing notifications go through the [`Notifier`] port
//! so the logic is testable without a UI.

pub mod controller;

use serde::Serialize;

use crate::store::ChangeKind;

pub use controller::{SyncController, SyncPhase, TrackedMessage};

/// One user-facing notification, e.g. "New message from Ana".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub kind: ChangeKind,
    pub collection: String,
    /// Display name of the actor: the record's name, else email, else
    /// "Someone".
    pub who: String,
}

/// Sink for change notifications. The SSE endpoint bridges this to the
/// admin UI; tests record into a vec.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}
