//! Aggregate statistics across the known collections.
//!
//! Each collection is counted independently; a failure on one records an
//! error entry for it and never aborts the others, so the response always
//! covers every requested collection name.

use std::collections::BTreeMap;

use axum::{extract::State, http::HeaderMap, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::require_admin;
use crate::errors::AppError;
use crate::state::AppState;
use crate::store::{Store, KNOWN_COLLECTIONS};
use crate::timestamp;

/// The "recent" count samples at most this many documents, newest first.
/// Collections with more than this many non-recent documents inserted out
/// of order can under-count — accepted, see DESIGN.md.
pub const RECENT_SAMPLE_LIMIT: i64 = 100;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    pub total: u64,
    pub recent: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsTotals {
    pub total_documents: u64,
    pub recent_documents: u64,
    pub collections: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub stats: BTreeMap<String, CollectionStats>,
    pub totals: StatsTotals,
    pub timestamp: DateTime<Utc>,
}

/// GET /api/admin/stats
pub async fn stats_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatsResponse>, AppError> {
    require_admin(&headers, &state.config)?;
    Ok(Json(
        compute_stats(&state.store, &KNOWN_COLLECTIONS, Utc::now()).await,
    ))
}

/// Computes per-collection totals plus a grand total. Infallible by
/// construction — per-collection failures are folded into the mapping.
pub async fn compute_stats(
    store: &Store,
    collections: &[&str],
    now: DateTime<Utc>,
) -> StatsResponse {
    let mut stats = BTreeMap::new();

    for &collection in collections {
        let entry = match collection_stats(store, collection, now).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Error getting stats for {collection}: {e}");
                CollectionStats {
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        };
        stats.insert(collection.to_string(), entry);
    }

    let totals = StatsTotals {
        total_documents: stats.values().map(|s| s.total).sum(),
        recent_documents: stats.values().map(|s| s.recent).sum(),
        collections: stats.len(),
    };

    StatsResponse {
        stats,
        totals,
        timestamp: now,
    }
}

async fn collection_stats(
    store: &Store,
    collection: &str,
    now: DateTime<Utc>,
) -> Result<CollectionStats, AppError> {
    let total = store.list(collection).await?.len() as u64;

    let sample = store
        .query(collection, "createdAt", true, RECENT_SAMPLE_LIMIT)
        .await?;
    let recent = sample
        .iter()
        .filter_map(|doc| doc.data.get("createdAt"))
        .filter_map(timestamp::normalize)
        .filter(|t| timestamp::within_recent_window(*t, now))
        .count() as u64;

    Ok(CollectionStats {
        total,
        recent,
        last_updated: Some(now),
        error: None,
    })
}
