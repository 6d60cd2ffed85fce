//! In-process store backend.
//!
//! Deterministic and dependency-free, used for local development
//! (`STORE_BACKEND=memory`) and throughout the test suite. Documents keep
//! insertion order per collection so descending sorts break ties the same
//! way the managed store's id order does.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::timestamp;

use super::{Applied, ChangeKind, Document, Fields, StoreBackend, WriteOp};

#[derive(Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn list(&self, collection: &str) -> Result<Vec<Document>, AppError> {
        let map = self.collections.read().await;
        Ok(map.get(collection).cloned().unwrap_or_default())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        let map = self.collections.read().await;
        Ok(map
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn insert(&self, collection: &str, id: &str, data: &Fields) -> Result<(), AppError> {
        let mut map = self.collections.write().await;
        let docs = map.entry(collection.to_string()).or_default();
        if docs.iter().any(|d| d.id == id) {
            return Err(AppError::Store(format!(
                "duplicate id '{id}' in '{collection}'"
            )));
        }
        docs.push(Document {
            id: id.to_string(),
            data: data.clone(),
        });
        Ok(())
    }

    async fn replace(&self, collection: &str, id: &str, data: &Fields) -> Result<(), AppError> {
        let mut map = self.collections.write().await;
        let docs = map.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| d.id == id) {
            Some(doc) => doc.data = data.clone(),
            None => docs.push(Document {
                id: id.to_string(),
                data: data.clone(),
            }),
        }
        Ok(())
    }

    async fn merge(
        &self,
        collection: &str,
        id: &str,
        data: &Fields,
    ) -> Result<Option<Document>, AppError> {
        let mut map = self.collections.write().await;
        Ok(merge_in(&mut map, collection, id, data))
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        let mut map = self.collections.write().await;
        let Some(docs) = map.get_mut(collection) else {
            return Ok(None);
        };
        match docs.iter().position(|d| d.id == id) {
            Some(idx) => Ok(Some(docs.remove(idx))),
            None => Ok(None),
        }
    }

    async fn query(
        &self,
        collection: &str,
        order_by: &str,
        descending: bool,
        limit: i64,
    ) -> Result<Vec<Document>, AppError> {
        let map = self.collections.read().await;
        let mut docs = map.get(collection).cloned().unwrap_or_default();
        docs.sort_by(|a, b| {
            cmp_keys(
                &sort_key(a, order_by),
                &sort_key(b, order_by),
                descending,
            )
        });
        docs.truncate(limit.max(0) as usize);
        Ok(docs)
    }

    async fn apply_batch(&self, ops: &[WriteOp]) -> Result<Vec<Applied>, AppError> {
        let mut map = self.collections.write().await;

        // All-or-nothing: work on a scratch copy, swap it in on success.
        let mut scratch = map.clone();
        let mut applied = Vec::with_capacity(ops.len());

        for op in ops {
            match op {
                WriteOp::Insert {
                    collection,
                    id,
                    data,
                } => {
                    let docs = scratch.entry(collection.clone()).or_default();
                    if docs.iter().any(|d| d.id == *id) {
                        return Err(AppError::Store(format!(
                            "duplicate id '{id}' in '{collection}'"
                        )));
                    }
                    let doc = Document {
                        id: id.clone(),
                        data: data.clone(),
                    };
                    docs.push(doc.clone());
                    applied.push(Applied {
                        collection: collection.clone(),
                        kind: ChangeKind::Added,
                        doc,
                    });
                }
                WriteOp::Merge {
                    collection,
                    id,
                    data,
                } => match merge_in(&mut scratch, collection, id, data) {
                    Some(doc) => applied.push(Applied {
                        collection: collection.clone(),
                        kind: ChangeKind::Modified,
                        doc,
                    }),
                    None => {
                        return Err(AppError::Store(format!(
                            "batch update target '{id}' missing in '{collection}'"
                        )))
                    }
                },
                WriteOp::Delete { collection, id } => {
                    if let Some(docs) = scratch.get_mut(collection) {
                        if let Some(idx) = docs.iter().position(|d| d.id == *id) {
                            let doc = docs.remove(idx);
                            applied.push(Applied {
                                collection: collection.clone(),
                                kind: ChangeKind::Removed,
                                doc,
                            });
                        }
                    }
                }
            }
        }

        *map = scratch;
        Ok(applied)
    }
}

fn merge_in(
    map: &mut HashMap<String, Vec<Document>>,
    collection: &str,
    id: &str,
    data: &Fields,
) -> Option<Document> {
    let docs = map.get_mut(collection)?;
    let doc = docs.iter_mut().find(|d| d.id == id)?;
    for (k, v) in data {
        doc.data.insert(k.clone(), v.clone());
    }
    Some(doc.clone())
}

enum SortKey {
    Instant(i64),
    Raw(String),
    Absent,
}

fn sort_key(doc: &Document, field: &str) -> SortKey {
    match doc.data.get(field) {
        None => SortKey::Absent,
        Some(v) => match timestamp::normalize(v) {
            Some(t) => SortKey::Instant(t.timestamp_millis()),
            None => SortKey::Raw(v.to_string()),
        },
    }
}

/// Documents missing the order field sort last in either direction;
/// instants sort before non-temporal values.
fn cmp_keys(a: &SortKey, b: &SortKey, descending: bool) -> Ordering {
    use SortKey::*;
    match (a, b) {
        (Instant(x), Instant(y)) => {
            if descending {
                y.cmp(x)
            } else {
                x.cmp(y)
            }
        }
        (Raw(x), Raw(y)) => {
            if descending {
                y.cmp(x)
            } else {
                x.cmp(y)
            }
        }
        (Absent, Absent) => Ordering::Equal,
        (Absent, _) => Ordering::Greater,
        (_, Absent) => Ordering::Less,
        (Instant(_), Raw(_)) => Ordering::Less,
        (Raw(_), Instant(_)) => Ordering::Greater,
    }
}
