//! Document store adapter.
//!
//! A thin, uniform facade over named collections of schema-less JSON
//! documents. The facade owns the cross-cutting concerns — id minting,
//! `createdAt`/`updatedAt` stamping, and change-feed publication — while the
//! actual persistence lives behind [`StoreBackend`]: Postgres (JSONB) in
//! production, an in-process map for local development and tests.

pub mod changes;
pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::errors::AppError;

pub use changes::{ChangeEvent, ChangeHub, ChangeKind, Subscription};

pub const PROJECTS: &str = "projects";
pub const TESTIMONIALS: &str = "testimonials";
pub const CONTACT_MESSAGES: &str = "contact_messages";
/// Older contact submissions landed here; still read for backward compat.
pub const LEGACY_MESSAGES: &str = "messages";

pub const KNOWN_COLLECTIONS: [&str; 4] =
    [PROJECTS, TESTIMONIALS, CONTACT_MESSAGES, LEGACY_MESSAGES];

/// Named fields of one document.
pub type Fields = serde_json::Map<String, Value>;

/// A document: opaque string id plus its fields.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub data: Fields,
}

impl Document {
    /// Flattens to `{"id": ..., <fields>}` — the wire shape used by the
    /// admin endpoints that return raw documents.
    pub fn to_json(&self) -> Value {
        let mut map = Fields::new();
        map.insert("id".to_string(), json!(self.id));
        for (k, v) in &self.data {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(map)
    }

    /// Same as [`to_json`](Self::to_json) with a `collection` tag appended.
    pub fn to_json_tagged(&self, collection: &str) -> Value {
        let mut value = self.to_json();
        if let Value::Object(map) = &mut value {
            map.insert("collection".to_string(), json!(collection));
        }
        value
    }
}

/// One operation of an all-or-nothing batch, as callers express it.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Create { collection: String, data: Fields },
    Update { collection: String, id: String, data: Fields },
    Delete { collection: String, id: String },
}

/// Batch operation after the facade has minted ids for creates.
/// This is what backends execute.
#[derive(Debug, Clone)]
pub enum WriteOp {
    Insert {
        collection: String,
        id: String,
        data: Fields,
    },
    Merge {
        collection: String,
        id: String,
        data: Fields,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// Outcome of one applied write, carried back so the facade can publish
/// change events after the batch commits.
#[derive(Debug, Clone)]
pub struct Applied {
    pub collection: String,
    pub kind: ChangeKind,
    pub doc: Document,
}

/// Persistence backend contract. All methods surface failures immediately —
/// no retries anywhere in the adapter.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    async fn list(&self, collection: &str) -> Result<Vec<Document>, AppError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError>;

    async fn insert(&self, collection: &str, id: &str, data: &Fields) -> Result<(), AppError>;

    /// Full replace; creates the document if it does not exist.
    async fn replace(&self, collection: &str, id: &str, data: &Fields) -> Result<(), AppError>;

    /// Shallow merge into an existing document. `None` if the id is unknown.
    async fn merge(
        &self,
        collection: &str,
        id: &str,
        data: &Fields,
    ) -> Result<Option<Document>, AppError>;

    /// Removes a document, returning it. `None` if the id was unknown.
    async fn remove(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError>;

    /// Best-effort ordered page. Documents missing the order field sort last.
    async fn query(
        &self,
        collection: &str,
        order_by: &str,
        descending: bool,
        limit: i64,
    ) -> Result<Vec<Document>, AppError>;

    /// Applies all ops or none of them. A merge targeting a missing id
    /// fails the whole batch.
    async fn apply_batch(&self, ops: &[WriteOp]) -> Result<Vec<Applied>, AppError>;
}

/// The store facade handed around in `AppState`.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn StoreBackend>,
    hub: Arc<ChangeHub>,
}

impl Store {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            backend,
            hub: Arc::new(ChangeHub::default()),
        }
    }

    pub async fn list(&self, collection: &str) -> Result<Vec<Document>, AppError> {
        self.backend.list(collection).await
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        self.backend.get(collection, id).await
    }

    /// Adds a document under a fresh id. `createdAt`/`updatedAt` are stamped
    /// unless the caller supplied them (imports and backdated admin creates
    /// carry their own).
    pub async fn add(&self, collection: &str, mut data: Fields) -> Result<Document, AppError> {
        let now = now_rfc3339();
        data.entry("createdAt".to_string())
            .or_insert_with(|| json!(now));
        data.entry("updatedAt".to_string())
            .or_insert_with(|| json!(now));

        let id = Uuid::new_v4().to_string();
        self.backend.insert(collection, &id, &data).await?;

        let doc = Document { id, data };
        self.publish(collection, ChangeKind::Added, doc.clone());
        Ok(doc)
    }

    /// Full replace (upsert). Always refreshes `updatedAt`.
    pub async fn set(
        &self,
        collection: &str,
        id: &str,
        mut data: Fields,
    ) -> Result<Document, AppError> {
        data.insert("updatedAt".to_string(), json!(now_rfc3339()));
        self.backend.replace(collection, id, &data).await?;

        let doc = Document {
            id: id.to_string(),
            data,
        };
        self.publish(collection, ChangeKind::Modified, doc.clone());
        Ok(doc)
    }

    /// Shallow merge of the supplied fields only; everything else in the
    /// document is untouched. Always refreshes `updatedAt`.
    pub async fn update(
        &self,
        collection: &str,
        id: &str,
        mut data: Fields,
    ) -> Result<Document, AppError> {
        data.insert("updatedAt".to_string(), json!(now_rfc3339()));
        match self.backend.merge(collection, id, &data).await? {
            Some(doc) => {
                self.publish(collection, ChangeKind::Modified, doc.clone());
                Ok(doc)
            }
            None => Err(AppError::NotFound(format!(
                "No document '{id}' in '{collection}'"
            ))),
        }
    }

    /// Deletes by id. Deleting an unknown id succeeds and publishes nothing.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError> {
        if let Some(doc) = self.backend.remove(collection, id).await? {
            self.publish(collection, ChangeKind::Removed, doc);
        }
        Ok(())
    }

    pub async fn query(
        &self,
        collection: &str,
        order_by: &str,
        descending: bool,
        limit: i64,
    ) -> Result<Vec<Document>, AppError> {
        self.backend.query(collection, order_by, descending, limit).await
    }

    /// Applies a list of operations all-or-nothing, then publishes one
    /// change event per applied op.
    pub async fn batch(&self, ops: Vec<BatchOp>) -> Result<(), AppError> {
        let resolved: Vec<WriteOp> = ops
            .into_iter()
            .map(|op| match op {
                BatchOp::Create { collection, data } => WriteOp::Insert {
                    collection,
                    id: Uuid::new_v4().to_string(),
                    data,
                },
                BatchOp::Update {
                    collection,
                    id,
                    data,
                } => WriteOp::Merge {
                    collection,
                    id,
                    data,
                },
                BatchOp::Delete { collection, id } => WriteOp::Delete { collection, id },
            })
            .collect();

        let applied = self.backend.apply_batch(&resolved).await?;
        for Applied {
            collection,
            kind,
            doc,
        } in applied
        {
            self.publish(&collection, kind, doc);
        }
        Ok(())
    }

    /// Subscribes to one collection's change feed. The receiver is
    /// registered before the snapshot is listed, so a mutation landing in
    /// between can be delivered twice — never missed.
    pub async fn subscribe(&self, collection: &str) -> Result<Subscription, AppError> {
        let rx = self.hub.receiver();
        let snapshot = self.backend.list(collection).await?;
        Ok(Subscription::new(collection, snapshot, rx))
    }

    fn publish(&self, collection: &str, kind: ChangeKind, doc: Document) {
        self.hub.publish(ChangeEvent {
            collection: collection.to_string(),
            kind,
            doc,
        });
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
