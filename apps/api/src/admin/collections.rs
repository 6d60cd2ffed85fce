//! Generic collection CRUD for the admin console's database tab.
//!
//! Operates on any collection by name — the console uses this for ad-hoc
//! inspection and cleanup beyond the typed per-resource endpoints.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::require_admin;
use crate::errors::AppError;
use crate::state::AppState;
use crate::store::{BatchOp, Fields, KNOWN_COLLECTIONS};

const DEFAULT_LIMIT: i64 = 50;

#[derive(Deserialize)]
pub struct ListQuery {
    pub collection: Option<String>,
    pub limit: Option<i64>,
    #[serde(rename = "orderBy")]
    pub order_by: Option<String>,
    #[serde(rename = "orderDirection")]
    pub order_direction: Option<String>,
}

/// GET /api/admin/collections?collection=all|<name>&limit=&orderBy=&orderDirection=
pub async fn list_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, AppError> {
    require_admin(&headers, &state.config)?;

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let order_by = query.order_by.as_deref().unwrap_or("createdAt");
    let descending = query.order_direction.as_deref().unwrap_or("desc") != "asc";
    let collection = query.collection.as_deref().unwrap_or("all");

    if collection == "all" {
        // One failing collection yields an empty list, not a failed response.
        let mut all = BTreeMap::new();
        for name in KNOWN_COLLECTIONS {
            let docs = match state.store.query(name, order_by, descending, limit).await {
                Ok(docs) => docs,
                Err(e) => {
                    tracing::warn!("Error fetching {name}: {e}");
                    Vec::new()
                }
            };
            let tagged: Vec<Value> = docs.iter().map(|d| d.to_json_tagged(name)).collect();
            all.insert(name.to_string(), tagged);
        }
        return Ok(Json(json!(all)));
    }

    let docs = state
        .store
        .query(collection, order_by, descending, limit)
        .await?;
    let tagged: Vec<Value> = docs.iter().map(|d| d.to_json_tagged(collection)).collect();
    Ok(Json(json!(tagged)))
}

/// POST /api/admin/collections  `{collection, data}`
pub async fn create_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    require_admin(&headers, &state.config)?;

    let (collection, data) = collection_and_data(&body)?;
    let doc = state.store.add(&collection, data).await?;
    Ok(Json(doc.to_json_tagged(&collection)))
}

/// PUT /api/admin/collections  `{collection, id, data}`
pub async fn update_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    require_admin(&headers, &state.config)?;

    let (collection, data) = collection_and_data(&body).map_err(|_| {
        AppError::Validation("Collection name, ID, and data are required".to_string())
    })?;
    let id = body
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            AppError::Validation("Collection name, ID, and data are required".to_string())
        })?;

    let doc = state.store.update(&collection, id, data).await?;
    Ok(Json(doc.to_json_tagged(&collection)))
}

#[derive(Deserialize)]
pub struct DeleteQuery {
    pub collection: Option<String>,
    pub id: Option<String>,
    pub bulk: Option<String>,
}

/// DELETE /api/admin/collections?collection=&id=&bulk=true
/// With `bulk=true`, `id` is a comma-separated id list deleted atomically.
pub async fn delete_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<Value>, AppError> {
    require_admin(&headers, &state.config)?;

    let (Some(collection), Some(id)) = (query.collection, query.id) else {
        return Err(AppError::Validation(
            "Collection name and ID are required".to_string(),
        ));
    };

    if query.bulk.as_deref() == Some("true") {
        let ids: Vec<String> = id.split(',').map(str::to_string).collect();
        let ops: Vec<BatchOp> = ids
            .iter()
            .map(|id| BatchOp::Delete {
                collection: collection.clone(),
                id: id.clone(),
            })
            .collect();
        state.store.batch(ops).await?;
        return Ok(Json(json!({ "deleted": ids.len(), "ids": ids })));
    }

    state.store.delete(&collection, &id).await?;
    Ok(Json(json!({ "deleted": 1, "id": id })))
}

fn collection_and_data(body: &Value) -> Result<(String, Fields), AppError> {
    let collection = body
        .get("collection")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    let data = body.get("data").and_then(Value::as_object);

    match (collection, data) {
        (Some(collection), Some(data)) => Ok((collection.to_string(), data.clone())),
        _ => Err(AppError::Validation(
            "Collection name and data are required".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBackend;
    use crate::store::Store;
    use crate::testutil::{admin_headers, test_state};
    use std::sync::Arc;

    fn state() -> AppState {
        test_state(Store::new(Arc::new(MemoryBackend::new())))
    }

    fn list_query(collection: Option<&str>) -> ListQuery {
        ListQuery {
            collection: collection.map(str::to_string),
            limit: None,
            order_by: None,
            order_direction: None,
        }
    }

    #[tokio::test]
    async fn all_returns_every_known_collection_key() {
        let state = state();
        let Json(resp) = list_handler(State(state), admin_headers(), Query(list_query(None)))
            .await
            .unwrap();

        let map = resp.as_object().unwrap();
        for name in KNOWN_COLLECTIONS {
            assert!(map.contains_key(name), "missing key {name}");
        }
    }

    #[tokio::test]
    async fn unpublished_projects_are_visible_here() {
        let state = state();
        let mut data = Fields::new();
        data.insert("title".to_string(), json!("Draft"));
        data.insert("isPublished".to_string(), json!(false));
        state.store.add("projects", data).await.unwrap();

        let Json(resp) = list_handler(
            State(state),
            admin_headers(),
            Query(list_query(Some("projects"))),
        )
        .await
        .unwrap();

        let docs = resp.as_array().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["title"], json!("Draft"));
        assert_eq!(docs[0]["collection"], json!("projects"));
    }

    #[tokio::test]
    async fn create_requires_collection_and_data() {
        let state = state();
        let err = create_handler(
            State(state),
            admin_headers(),
            Json(json!({"collection": "projects"})),
        )
        .await
        .unwrap_err();
        assert!(
            matches!(err, AppError::Validation(msg) if msg == "Collection name and data are required")
        );
    }

    #[tokio::test]
    async fn create_then_update_round_trips() {
        let state = state();
        let Json(created) = create_handler(
            State(state.clone()),
            admin_headers(),
            Json(json!({"collection": "testimonials", "data": {"name": "Ana"}})),
        )
        .await
        .unwrap();

        let id = created["id"].as_str().unwrap();
        let Json(updated) = update_handler(
            State(state),
            admin_headers(),
            Json(json!({
                "collection": "testimonials",
                "id": id,
                "data": {"name": "Ana Maria"},
            })),
        )
        .await
        .unwrap();

        assert_eq!(updated["name"], json!("Ana Maria"));
        assert_eq!(updated["collection"], json!("testimonials"));
    }

    #[tokio::test]
    async fn bulk_delete_by_comma_separated_ids() {
        let state = state();
        let a = state.store.add("projects", Fields::new()).await.unwrap();
        let b = state.store.add("projects", Fields::new()).await.unwrap();

        let Json(resp) = delete_handler(
            State(state.clone()),
            admin_headers(),
            Query(DeleteQuery {
                collection: Some("projects".to_string()),
                id: Some(format!("{},{}", a.id, b.id)),
                bulk: Some("true".to_string()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(resp["deleted"], json!(2));
        assert!(state.store.list("projects").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_requires_collection_and_id() {
        let state = state();
        let err = delete_handler(
            State(state),
            admin_headers(),
            Query(DeleteQuery {
                collection: Some("projects".to_string()),
                id: None,
                bulk: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
