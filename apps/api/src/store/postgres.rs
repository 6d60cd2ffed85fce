//! Postgres store backend.
//!
//! All collections live in one `documents` table keyed by
//! `(collection, id)` with the fields in a JSONB column — the closest
//! relational rendition of the managed store's schema-less collections.
//! Batches run inside a single transaction.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::errors::AppError;

use super::{Applied, ChangeKind, Document, Fields, StoreBackend, WriteOp};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        collection  TEXT        NOT NULL,
        id          TEXT        NOT NULL,
        data        JSONB       NOT NULL DEFAULT '{}'::jsonb,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (collection, id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS documents_collection_idx \
     ON documents (collection, created_at DESC)",
];

pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    /// Connects, bootstraps the `documents` table, and returns the backend.
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("Connecting to PostgreSQL...");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }
}

fn to_document(id: String, data: Value) -> Document {
    Document {
        id,
        data: data.as_object().cloned().unwrap_or_default(),
    }
}

fn data_value(data: &Fields) -> Value {
    Value::Object(data.clone())
}

#[async_trait]
impl StoreBackend for PgBackend {
    async fn list(&self, collection: &str) -> Result<Vec<Document>, AppError> {
        let rows = sqlx::query_as::<_, (String, Value)>(
            "SELECT id, data FROM documents WHERE collection = $1 ORDER BY created_at",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, data)| to_document(id, data))
            .collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        let row = sqlx::query_as::<_, (String, Value)>(
            "SELECT id, data FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, data)| to_document(id, data)))
    }

    async fn insert(&self, collection: &str, id: &str, data: &Fields) -> Result<(), AppError> {
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(id)
            .bind(data_value(data))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace(&self, collection: &str, id: &str, data: &Fields) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)
            ON CONFLICT (collection, id)
            DO UPDATE SET data = EXCLUDED.data, updated_at = now()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(data_value(data))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn merge(
        &self,
        collection: &str,
        id: &str,
        data: &Fields,
    ) -> Result<Option<Document>, AppError> {
        let row = sqlx::query_as::<_, (String, Value)>(
            r#"
            UPDATE documents SET data = data || $3, updated_at = now()
            WHERE collection = $1 AND id = $2
            RETURNING id, data
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(data_value(data))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, data)| to_document(id, data)))
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        let row = sqlx::query_as::<_, (String, Value)>(
            "DELETE FROM documents WHERE collection = $1 AND id = $2 RETURNING id, data",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, data)| to_document(id, data)))
    }

    async fn query(
        &self,
        collection: &str,
        order_by: &str,
        descending: bool,
        limit: i64,
    ) -> Result<Vec<Document>, AppError> {
        // The order field is bound as a text operand of `->>`; only the
        // direction keyword is interpolated. Text ordering is best-effort
        // by design — RFC 3339 strings (the stamped format) sort correctly.
        let sql = if descending {
            "SELECT id, data FROM documents WHERE collection = $1 \
             ORDER BY data->>$2 DESC NULLS LAST, created_at DESC LIMIT $3"
        } else {
            "SELECT id, data FROM documents WHERE collection = $1 \
             ORDER BY data->>$2 ASC NULLS LAST, created_at ASC LIMIT $3"
        };

        let rows = sqlx::query_as::<_, (String, Value)>(sql)
            .bind(collection)
            .bind(order_by)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, data)| to_document(id, data))
            .collect())
    }

    async fn apply_batch(&self, ops: &[WriteOp]) -> Result<Vec<Applied>, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut applied = Vec::with_capacity(ops.len());

        for op in ops {
            match op {
                WriteOp::Insert {
                    collection,
                    id,
                    data,
                } => {
                    sqlx::query(
                        "INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)",
                    )
                    .bind(collection)
                    .bind(id)
                    .bind(data_value(data))
                    .execute(&mut *tx)
                    .await?;
                    applied.push(Applied {
                        collection: collection.clone(),
                        kind: ChangeKind::Added,
                        doc: Document {
                            id: id.clone(),
                            data: data.clone(),
                        },
                    });
                }
                WriteOp::Merge {
                    collection,
                    id,
                    data,
                } => {
                    let row = sqlx::query_as::<_, (String, Value)>(
                        r#"
                        UPDATE documents SET data = data || $3, updated_at = now()
                        WHERE collection = $1 AND id = $2
                        RETURNING id, data
                        "#,
                    )
                    .bind(collection)
                    .bind(id)
                    .bind(data_value(data))
                    .fetch_optional(&mut *tx)
                    .await?;

                    // Dropping the transaction without commit rolls back.
                    let (id, data) = row.ok_or_else(|| {
                        AppError::Store(format!(
                            "batch update target '{id}' missing in '{collection}'"
                        ))
                    })?;
                    applied.push(Applied {
                        collection: collection.clone(),
                        kind: ChangeKind::Modified,
                        doc: to_document(id, data),
                    });
                }
                WriteOp::Delete { collection, id } => {
                    let row = sqlx::query_as::<_, (String, Value)>(
                        "DELETE FROM documents WHERE collection = $1 AND id = $2 RETURNING id, data",
                    )
                    .bind(collection)
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;

                    if let Some((id, data)) = row {
                        applied.push(Applied {
                            collection: collection.clone(),
                            kind: ChangeKind::Removed,
                            doc: to_document(id, data),
                        });
                    }
                }
            }
        }

        tx.commit().await?;
        Ok(applied)
    }
}
