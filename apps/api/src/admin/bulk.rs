//! Bulk operations and data export/import.
//!
//! Everything here runs through the store's batch primitive, so a bulk
//! request either applies entirely or not at all.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::require_admin;
use crate::errors::AppError;
use crate::state::AppState;
use crate::store::{BatchOp, Fields, Store};

#[derive(Deserialize)]
pub struct BulkRequest {
    pub operation: String,
    pub collection: String,
    pub data: Option<Value>,
    pub ids: Option<Vec<String>>,
}

/// POST /api/admin/bulk
pub async fn bulk_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BulkRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&headers, &state.config)?;

    match req.operation.as_str() {
        "bulk_create" => bulk_create(&state.store, &req.collection, req.data).await,
        "bulk_update" => bulk_update(&state.store, &req.collection, req.data).await,
        "bulk_delete" => bulk_delete(&state.store, &req.collection, req.ids).await,
        "export_data" => export(&state.store, &req.collection).await.map(Json),
        "import_data" => import(&state.store, &req.collection, req.data).await,
        _ => Err(AppError::Validation("Invalid operation".to_string())),
    }
}

/// GET /api/admin/export/:collection
/// Same payload as the `export_data` bulk operation; the console's export
/// buttons call this path directly.
pub async fn export_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(collection): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_admin(&headers, &state.config)?;
    export(&state.store, &collection).await.map(Json)
}

async fn bulk_create(
    store: &Store,
    collection: &str,
    data: Option<Value>,
) -> Result<Json<Value>, AppError> {
    let items = object_array(data, "data")?;
    let now = now_stamp();

    let ops: Vec<BatchOp> = items
        .into_iter()
        .map(|mut fields| {
            fields.insert("createdAt".to_string(), json!(now));
            fields.insert("updatedAt".to_string(), json!(now));
            BatchOp::Create {
                collection: collection.to_string(),
                data: fields,
            }
        })
        .collect();

    let created = ops.len();
    store.batch(ops).await?;
    Ok(Json(json!({ "created": created })))
}

async fn bulk_update(
    store: &Store,
    collection: &str,
    data: Option<Value>,
) -> Result<Json<Value>, AppError> {
    let items = object_array(data, "data")?;
    let now = now_stamp();

    let mut ops = Vec::with_capacity(items.len());
    for mut item in items {
        let id = item
            .remove("id")
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| AppError::Validation("Each update requires an id".to_string()))?;
        let mut fields = match item.remove("data") {
            Some(Value::Object(map)) => map,
            _ => return Err(AppError::Validation("Each update requires data".to_string())),
        };
        fields.insert("updatedAt".to_string(), json!(now));
        ops.push(BatchOp::Update {
            collection: collection.to_string(),
            id,
            data: fields,
        });
    }

    let updated = ops.len();
    store.batch(ops).await?;
    Ok(Json(json!({ "updated": updated })))
}

async fn bulk_delete(
    store: &Store,
    collection: &str,
    ids: Option<Vec<String>>,
) -> Result<Json<Value>, AppError> {
    let ids = ids.ok_or_else(|| AppError::Validation("ids are required".to_string()))?;

    let ops: Vec<BatchOp> = ids
        .iter()
        .map(|id| BatchOp::Delete {
            collection: collection.to_string(),
            id: id.clone(),
        })
        .collect();

    store.batch(ops).await?;
    Ok(Json(json!({ "deleted": ids.len(), "ids": ids })))
}

pub(crate) async fn export(store: &Store, collection: &str) -> Result<Value, AppError> {
    let docs = store.list(collection).await?;
    let data: Vec<Value> = docs.iter().map(|d| d.to_json()).collect();

    Ok(json!({
        "collection": collection,
        "count": data.len(),
        "data": data,
        "exportedAt": now_stamp(),
    }))
}

async fn import(
    store: &Store,
    collection: &str,
    data: Option<Value>,
) -> Result<Json<Value>, AppError> {
    let items = object_array(data, "data")?;
    let now = now_stamp();

    // Imports deliberately stamp `importedAt` instead of `createdAt`, so an
    // imported batch is distinguishable from organic writes.
    let ops: Vec<BatchOp> = items
        .into_iter()
        .map(|mut fields| {
            fields.insert("importedAt".to_string(), json!(now));
            fields.insert("updatedAt".to_string(), json!(now));
            BatchOp::Create {
                collection: collection.to_string(),
                data: fields,
            }
        })
        .collect();

    let imported = ops.len();
    store.batch(ops).await?;
    Ok(Json(json!({ "imported": imported })))
}

fn object_array(data: Option<Value>, field: &str) -> Result<Vec<Fields>, AppError> {
    let Some(Value::Array(items)) = data else {
        return Err(AppError::Validation(format!(
            "'{field}' must be an array of objects"
        )));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map),
            _ => Err(AppError::Validation(format!(
                "'{field}' must be an array of objects"
            ))),
        })
        .collect()
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
