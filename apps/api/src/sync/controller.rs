use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::admin::stats::{compute_stats, StatsResponse};
use crate::errors::AppError;
use crate::messages;
use crate::models::message::ContactMessage;
use crate::models::project::Project;
use crate::models::testimonial::Testimonial;
use crate::store::{Document, Store, CONTACT_MESSAGES, KNOWN_COLLECTIONS, LEGACY_MESSAGES, PROJECTS, TESTIMONIALS};

use super::{Notification, Notifier};

/// Fallback poll cadence while synced.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    LoggedOut,
    Loading,
    Synced,
}

/// A merged message plus whether this controller instance has seen its id
/// before. The seen-id set lives only as long as the controller.
#[derive(Debug, Clone)]
pub struct TrackedMessage {
    pub message: ContactMessage,
    pub is_new: bool,
}

/// Owns all admin-side sync state — subscriptions, the poll timer, the
/// seen-id set — behind an explicit `start`/`stop` lifecycle, so teardown
/// is deterministic and nothing leaks past logout.
#[derive(Clone)]
pub struct SyncController {
    store: Store,
    notifier: Arc<dyn Notifier>,
    inner: Arc<Inner>,
}

struct Inner {
    active: AtomicBool,
    phase: Mutex<SyncPhase>,
    projects: Mutex<Vec<Project>>,
    messages: Mutex<Vec<TrackedMessage>>,
    testimonials: Mutex<Vec<Testimonial>>,
    stats: Mutex<Option<StatsResponse>>,
    seen: Mutex<HashSet<String>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncController {
    pub fn new(store: Store, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            inner: Arc::new(Inner {
                active: AtomicBool::new(false),
                phase: Mutex::new(SyncPhase::LoggedOut),
                projects: Mutex::new(Vec::new()),
                messages: Mutex::new(Vec::new()),
                testimonials: Mutex::new(Vec::new()),
                stats: Mutex::new(None),
                seen: Mutex::new(HashSet::new()),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// LoggedOut → Loading → Synced. Performs the initial bulk load (each
    /// resource failing independently), then establishes the change-feed
    /// subscriptions and the poll timer. A second `start` on a running
    /// controller is a no-op.
    pub async fn start(&self, credential: &str) -> Result<(), AppError> {
        if credential.is_empty() {
            return Err(AppError::Validation("Missing credential".to_string()));
        }
        if self.inner.active.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.set_phase(SyncPhase::Loading);

        tokio::join!(
            self.refresh_projects(),
            self.refresh_messages(),
            self.refresh_testimonials(),
            self.refresh_stats(),
        );

        if !self.is_active() {
            // Stopped while the initial load was in flight.
            return Ok(());
        }
        self.set_phase(SyncPhase::Synced);
        self.spawn_watchers();
        Ok(())
    }

    /// Unconditional, idempotent teardown: cancels the subscriptions and
    /// the poll timer. In-flight fetches see the cleared flag and discard
    /// their results.
    pub fn stop(&self) {
        self.inner.active.store(false, Ordering::SeqCst);
        let mut tasks = self.inner.tasks.lock().unwrap();
        for task in tasks.drain(..) {
            task.abort();
        }
        self.set_phase(SyncPhase::LoggedOut);
    }

    pub fn phase(&self) -> SyncPhase {
        *self.inner.phase.lock().unwrap()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.inner.projects.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<TrackedMessage> {
        self.inner.messages.lock().unwrap().clone()
    }

    pub fn testimonials(&self) -> Vec<Testimonial> {
        self.inner.testimonials.lock().unwrap().clone()
    }

    pub fn stats(&self) -> Option<StatsResponse> {
        self.inner.stats.lock().unwrap().clone()
    }

    fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.inner.phase.lock().unwrap() = phase;
    }

    fn spawn_watchers(&self) {
        let handles = vec![
            self.spawn(|this| this.watch(CONTACT_MESSAGES, true)),
            self.spawn(|this| this.watch(LEGACY_MESSAGES, true)),
            self.spawn(|this| this.watch(PROJECTS, false)),
            self.spawn(|this| this.poll_loop()),
        ];
        self.inner.tasks.lock().unwrap().extend(handles);
        // stop() may have raced the spawns; make sure nothing survives it.
        if !self.is_active() {
            self.stop();
        }
    }

    fn spawn<F, Fut>(&self, f: F) -> JoinHandle<()>
    where
        F: FnOnce(SyncController) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(f(self.clone()))
    }

    /// Watches one collection's change feed. The first delivery is the
    /// initial snapshot and must not produce notifications; every later
    /// record produces exactly one, then the affected list is re-fetched.
    async fn watch(self, collection: &'static str, announce: bool) {
        let mut sub = match self.store.subscribe(collection).await {
            Ok(sub) => sub,
            Err(e) => {
                tracing::warn!("listener setup failed for {collection}: {e}");
                return;
            }
        };

        let mut initial = true;
        while let Some(batch) = sub.next_batch().await {
            if !self.is_active() {
                break;
            }
            if initial {
                initial = false;
            } else if announce {
                for event in &batch {
                    self.notifier.notify(Notification {
                        kind: event.kind,
                        collection: collection.to_string(),
                        who: who_from(&event.doc),
                    });
                }
            }

            if collection == PROJECTS {
                self.refresh_projects().await;
            } else {
                self.refresh_messages().await;
            }
        }
    }

    async fn poll_loop(self) {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.tick().await; // the first tick completes immediately
        loop {
            ticker.tick().await;
            if !self.is_active() {
                break;
            }
            self.refresh_messages().await;
            self.refresh_stats().await;
        }
    }

    async fn refresh_projects(&self) {
        if !self.is_active() {
            return;
        }
        match self.store.list(PROJECTS).await {
            Ok(docs) => {
                if !self.is_active() {
                    return;
                }
                // Admin view: everything, including unpublished drafts.
                let mut projects: Vec<Project> =
                    docs.iter().map(Project::from_document).collect();
                projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                *self.inner.projects.lock().unwrap() = projects;
            }
            Err(e) => tracing::warn!("projects refresh failed: {e}"),
        }
    }

    async fn refresh_messages(&self) {
        if !self.is_active() {
            return;
        }
        let merged = messages::fetch_merged(&self.store).await;
        if !self.is_active() {
            return;
        }

        let mut seen = self.inner.seen.lock().unwrap();
        let tracked: Vec<TrackedMessage> = merged
            .into_iter()
            .map(|message| {
                let is_new = !seen.contains(&message.id);
                seen.insert(message.id.clone());
                TrackedMessage { message, is_new }
            })
            .collect();
        drop(seen);

        *self.inner.messages.lock().unwrap() = tracked;
    }

    async fn refresh_testimonials(&self) {
        if !self.is_active() {
            return;
        }
        match self.store.list(TESTIMONIALS).await {
            Ok(docs) => {
                if !self.is_active() {
                    return;
                }
                let now = Utc::now();
                let mut testimonials: Vec<Testimonial> = docs
                    .iter()
                    .map(|doc| Testimonial::from_document(doc, now))
                    .collect();
                testimonials.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
                *self.inner.testimonials.lock().unwrap() = testimonials;
            }
            Err(e) => tracing::warn!("testimonials refresh failed: {e}"),
        }
    }

    async fn refresh_stats(&self) {
        if !self.is_active() {
            return;
        }
        let stats = compute_stats(&self.store, &KNOWN_COLLECTIONS, Utc::now()).await;
        if !self.is_active() {
            return;
        }
        *self.inner.stats.lock().unwrap() = Some(stats);
    }
}

fn who_from(doc: &Document) -> String {
    for key in ["name", "email"] {
        if let Some(s) = doc.data.get(key).and_then(Value::as_str) {
            if !s.is_empty() {
                return s.to_string();
            }
        }
    }
    "Someone".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBackend;
    use crate::store::{ChangeKind, Fields, StoreBackend};
    use serde_json::json;

    #[derive(Default)]
    struct RecordingNotifier {
        notes: Mutex<Vec<Notification>>,
    }

    impl RecordingNotifier {
        fn all(&self) -> Vec<Notification> {
            self.notes.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: Notification) {
            self.notes.lock().unwrap().push(notification);
        }
    }

    struct Fixture {
        backend: Arc<MemoryBackend>,
        store: Store,
        notifier: Arc<RecordingNotifier>,
        controller: SyncController,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(MemoryBackend::new());
        let store = Store::new(backend.clone());
        let notifier = Arc::new(RecordingNotifier::default());
        let controller = SyncController::new(store.clone(), notifier.clone());
        Fixture {
            backend,
            store,
            notifier,
            controller,
        }
    }

    fn named(name: &str) -> Fields {
        let mut data = Fields::new();
        data.insert("name".to_string(), json!(name));
        data
    }

    /// Lets spawned watcher tasks run; paused-clock sleeps advance
    /// instantly once the runtime is otherwise idle.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_is_silent_then_one_add_notifies_once() {
        let f = fixture();
        for i in 0..3 {
            f.store
                .add(CONTACT_MESSAGES, named(&format!("existing-{i}")))
                .await
                .unwrap();
        }

        f.controller.start("secret").await.unwrap();
        settle().await;

        assert_eq!(f.controller.phase(), SyncPhase::Synced);
        assert_eq!(f.controller.messages().len(), 3);
        assert!(f.notifier.all().is_empty(), "snapshot must not notify");

        f.store.add(CONTACT_MESSAGES, named("Ben")).await.unwrap();
        settle().await;

        let notes = f.notifier.all();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, ChangeKind::Added);
        assert_eq!(notes[0].who, "Ben");
        assert_eq!(notes[0].collection, CONTACT_MESSAGES);
    }

    #[tokio::test(start_paused = true)]
    async fn removal_notifies_with_email_fallback() {
        let f = fixture();
        let mut data = Fields::new();
        data.insert("email".to_string(), json!("a@x.com"));
        let doc = f.store.add(LEGACY_MESSAGES, data).await.unwrap();

        f.controller.start("secret").await.unwrap();
        settle().await;

        f.store.delete(LEGACY_MESSAGES, &doc.id).await.unwrap();
        settle().await;

        let notes = f.notifier.all();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, ChangeKind::Removed);
        assert_eq!(notes[0].who, "a@x.com");
    }

    #[tokio::test(start_paused = true)]
    async fn project_changes_resync_without_notifying() {
        let f = fixture();
        f.controller.start("secret").await.unwrap();
        settle().await;
        assert!(f.controller.projects().is_empty());

        let mut data = Fields::new();
        data.insert("title".to_string(), json!("Draft"));
        data.insert("isPublished".to_string(), json!(false));
        f.store.add("projects", data).await.unwrap();
        settle().await;

        // Unpublished drafts are visible to the admin view.
        assert_eq!(f.controller.projects().len(), 1);
        assert!(f.notifier.all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn seen_ids_classify_new_versus_previously_seen() {
        let f = fixture();
        f.store.add(CONTACT_MESSAGES, named("First")).await.unwrap();

        f.controller.start("secret").await.unwrap();
        settle().await;
        assert!(f.controller.messages().iter().all(|m| m.is_new));

        f.store.add(CONTACT_MESSAGES, named("Second")).await.unwrap();
        settle().await;

        let messages = f.controller.messages();
        assert_eq!(messages.len(), 2);
        for m in &messages {
            assert_eq!(m.is_new, m.message.name == "Second");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn poll_picks_up_writes_that_bypass_the_feed() {
        let f = fixture();
        f.controller.start("secret").await.unwrap();
        settle().await;

        // A direct backend write publishes no change event, like a write
        // from outside this process.
        f.backend
            .insert(CONTACT_MESSAGES, "direct", &named("Quiet"))
            .await
            .unwrap();
        settle().await;
        assert!(f.controller.messages().is_empty());

        tokio::time::sleep(POLL_INTERVAL + Duration::from_secs(1)).await;

        let messages = f.controller.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message.name, "Quiet");
        // The poll path resyncs silently.
        assert!(f.notifier.all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_refreshes_stats() {
        let f = fixture();
        f.controller.start("secret").await.unwrap();
        settle().await;
        let first = f.controller.stats().unwrap();
        assert_eq!(first.totals.total_documents, 0);

        f.backend
            .insert(TESTIMONIALS, "direct", &named("Quiet"))
            .await
            .unwrap();
        tokio::time::sleep(POLL_INTERVAL + Duration::from_secs(1)).await;

        let refreshed = f.controller.stats().unwrap();
        assert_eq!(refreshed.totals.total_documents, 1);
        assert_eq!(f.controller.testimonials().len(), 0); // only poll-covered lists refresh
    }

    #[tokio::test(start_paused = true)]
    async fn stop_tears_down_and_discards_later_changes() {
        let f = fixture();
        f.controller.start("secret").await.unwrap();
        settle().await;

        f.controller.stop();
        assert_eq!(f.controller.phase(), SyncPhase::LoggedOut);

        f.store.add(CONTACT_MESSAGES, named("After")).await.unwrap();
        tokio::time::sleep(POLL_INTERVAL + Duration::from_secs(1)).await;

        assert!(f.notifier.all().is_empty());
        assert!(f.controller.messages().is_empty());

        // Idempotent.
        f.controller.stop();
        assert_eq!(f.controller.phase(), SyncPhase::LoggedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_credential_never_leaves_logged_out() {
        let f = fixture();
        assert!(f.controller.start("").await.is_err());
        assert_eq!(f.controller.phase(), SyncPhase::LoggedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_a_no_op() {
        let f = fixture();
        f.controller.start("secret").await.unwrap();
        settle().await;
        f.controller.start("secret").await.unwrap();
        settle().await;

        f.store.add(CONTACT_MESSAGES, named("Once")).await.unwrap();
        settle().await;
        // Still exactly one subscription per collection.
        assert_eq!(f.notifier.all().len(), 1);
    }
}
