//! Document storage.
//!
//! Every collection is a bag of JSON documents keyed by a generated id. The
//! only query capability is a conjunction of equality filters on top-level
//! fields, which is all the handlers need.

mod models;

pub use models::*;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::{SqliteArguments, SqlitePoolOptions};
use sqlx::query::QueryAs;
use sqlx::{Sqlite, SqlitePool};
use std::path::Path;
use tracing::info;

/// Collection names.
pub mod collections {
    pub const USERS: &str = "users";
    pub const LOGOS: &str = "logos";
    pub const DESIGNS: &str = "designs";
    pub const DESIGN_FILES: &str = "design_files";
    pub const STANDS: &str = "stands";
    pub const MODELS: &str = "models";
    pub const OFFERS: &str = "offers";
    pub const COMPANY_INFO: &str = "company_info";
    pub const CALENDAR_EVENTS: &str = "calendar_events";
    pub const DOWNLOADS: &str = "downloads";
    pub const VIDEOS: &str = "videos";
}

/// Equality filter on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// A raw document as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(self) -> Result<Stored<T>> {
        let data = serde_json::from_value(self.data)
            .with_context(|| format!("Malformed document {}", self.id))?;
        Ok(Stored { id: self.id, data })
    }
}

/// A typed document together with its id. Serializes as `{ "id": ..., ...fields }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stored<T> {
    pub id: String,
    #[serde(flatten)]
    pub data: T,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Documents matching every filter, in insertion order. No filters returns the whole collection.
    async fn find(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>>;

    /// Insert under a freshly generated id.
    async fn add(&self, collection: &str, data: Value) -> Result<String>;

    /// Insert or replace under a caller-chosen id.
    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<()>;

    /// Shallow-merge `patch` into an existing document. Returns false if it does not exist.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<bool>;

    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;
}

impl dyn DocumentStore {
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Stored<T>>> {
        self.get(collection, id).await?.map(Document::decode).transpose()
    }

    pub async fn find_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<Stored<T>>> {
        self.find(collection, filters)
            .await?
            .into_iter()
            .map(Document::decode)
            .collect()
    }

    pub async fn find_one_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Stored<T>>> {
        let filters = [Filter::eq(field, value)];
        self.find(collection, &filters)
            .await?
            .into_iter()
            .next()
            .map(Document::decode)
            .transpose()
    }

    pub async fn add_as<T: Serialize + Sync>(&self, collection: &str, data: &T) -> Result<String> {
        let value = serde_json::to_value(data)?;
        self.add(collection, value).await
    }

    pub async fn update_with<T: Serialize + Sync>(
        &self,
        collection: &str,
        id: &str,
        patch: &T,
    ) -> Result<bool> {
        let value = serde_json::to_value(patch)?;
        self.update(collection, id, value).await
    }
}

fn merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                target.insert(key, value);
            }
        }
        (target, patch) => *target = patch,
    }
}

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        // Strip SQL comment lines (lines starting with --)
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

/// SQLite-backed document store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open(path: &Path) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", path.display());
        info!("Initializing database at {}", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        // WAL for concurrent readers during writes
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&pool)
            .await?;

        Self::with_pool(pool).await
    }

    /// Private in-memory database. A single connection is kept alive for the pool's lifetime.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: generic document table
    execute_sql(pool, include_str!("../../migrations/001_documents.sql")).await?;

    info!("Migrations completed");
    Ok(())
}

type DocumentQuery<'q> = QueryAs<'q, Sqlite, (String, String), SqliteArguments<'q>>;

fn bind_filter_value<'q>(query: DocumentQuery<'q>, value: &Value) -> DocumentQuery<'q> {
    match value {
        Value::String(s) => query.bind(s.clone()),
        // json_extract yields 1/0 for JSON booleans
        Value::Bool(b) => query.bind(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        other => query.bind(other.to_string()),
    }
}

fn parse_row((id, raw): (String, String)) -> Result<Document> {
    let data = serde_json::from_str(&raw).with_context(|| format!("Corrupt document {}", id))?;
    Ok(Document { id, data })
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id, data FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(parse_row).transpose()
    }

    async fn find(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>> {
        let mut sql = String::from("SELECT id, data FROM documents WHERE collection = ?");
        for filter in filters {
            if filter.value.is_null() {
                sql.push_str(" AND json_extract(data, ?) IS NULL");
            } else {
                sql.push_str(" AND json_extract(data, ?) = ?");
            }
        }
        sql.push_str(" ORDER BY rowid");

        let mut query: DocumentQuery<'_> = sqlx::query_as(&sql).bind(collection);
        for filter in filters {
            query = query.bind(format!("$.{}", filter.field));
            if !filter.value.is_null() {
                query = bind_filter_value(query, &filter.value);
            }
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(parse_row).collect()
    }

    async fn add(&self, collection: &str, data: Value) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(&id)
            .bind(data.to_string())
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)
             ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, updated_at = datetime('now')",
        )
        .bind(collection)
        .bind(id)
        .bind(data.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String,)> =
            sqlx::query_as("SELECT data FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((raw,)) = row else {
            return Ok(false);
        };

        let mut current: Value =
            serde_json::from_str(&raw).with_context(|| format!("Corrupt document {}", id))?;
        merge(&mut current, patch);

        sqlx::query(
            "UPDATE documents SET data = ?, updated_at = datetime('now') WHERE collection = ? AND id = ?",
        )
        .bind(current.to_string())
        .bind(collection)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    async fn store() -> Arc<dyn DocumentStore> {
        Arc::new(SqliteStore::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let store = store().await;
        let id = store
            .add("things", json!({"name": "Acme", "n": 3}))
            .await
            .unwrap();

        let doc = store.get("things", &id).await.unwrap().unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(doc.data["name"], "Acme");
        assert!(store.get("things", "missing").await.unwrap().is_none());
        assert!(store.get("other", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_with_filters() {
        let store = store().await;
        store
            .add("users", json!({"name": "a", "role": "co", "flag": true}))
            .await
            .unwrap();
        store
            .add("users", json!({"name": "b", "role": "visitor", "flag": false}))
            .await
            .unwrap();
        store
            .add("users", json!({"name": "c", "role": "co", "flag": false}))
            .await
            .unwrap();

        let all = store.find("users", &[]).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].data["name"], "a");

        let companies = store
            .find("users", &[Filter::eq("role", "co")])
            .await
            .unwrap();
        let names: Vec<_> = companies.iter().map(|d| d.data["name"].clone()).collect();
        assert_eq!(names, vec![json!("a"), json!("c")]);

        let flagged = store
            .find("users", &[Filter::eq("role", "co"), Filter::eq("flag", true)])
            .await
            .unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].data["name"], "a");

        let none = store
            .find("users", &[Filter::eq("role", "admin")])
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_top_level_fields() {
        let store = store().await;
        let id = store
            .add("users", json!({"name": "a", "designComplete": false}))
            .await
            .unwrap();

        assert!(store
            .update("users", &id, json!({"designComplete": true}))
            .await
            .unwrap());
        let doc = store.get("users", &id).await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"name": "a", "designComplete": true}));

        assert!(!store
            .update("users", "missing", json!({"x": 1}))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_set_and_delete() {
        let store = store().await;
        store.set("events", "co1", json!({"n": 1})).await.unwrap();
        store.set("events", "co1", json!({"n": 2})).await.unwrap();
        let doc = store.get("events", "co1").await.unwrap().unwrap();
        assert_eq!(doc.data["n"], 2);

        assert!(store.delete("events", "co1").await.unwrap());
        assert!(!store.delete("events", "co1").await.unwrap());
        assert!(store.get("events", "co1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Thing {
            name: String,
        }

        let store = store().await;
        let id = store
            .add_as("things", &Thing { name: "x".into() })
            .await
            .unwrap();
        let thing: Stored<Thing> = store.get_as("things", &id).await.unwrap().unwrap();
        assert_eq!(thing.data.name, "x");

        let found: Option<Stored<Thing>> = store.find_one_as("things", "name", "x").await.unwrap();
        assert_eq!(found.unwrap().id, id);

        let rendered = serde_json::to_value(&thing).unwrap();
        assert_eq!(rendered, json!({"id": id, "name": "x"}));
    }
}
