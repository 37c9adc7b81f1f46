//! Table stores the action endpoint scans
//!
//! Items are opaque JSON documents returned verbatim, in insertion order.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Table store query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Table store migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Stored item is not valid JSON: {0}")]
    CorruptItem(#[from] serde_json::Error),

    #[error("Failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait TableStore: Send + Sync {
    /// Every item of `table`, all pages drained.
    async fn scan(&self, table: &str) -> Result<Vec<Value>, StoreError>;
}

/// Process-local store; empty unless seeded.
#[derive(Debug, Default)]
pub struct InMemoryTableStore {
    tables: RwLock<HashMap<String, Vec<Value>>>,
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(table: impl Into<String>, items: Vec<Value>) -> Self {
        let mut tables = HashMap::new();
        tables.insert(table.into(), items);
        Self {
            tables: RwLock::new(tables),
        }
    }

    pub async fn insert(&self, table: &str, item: Value) {
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(item);
    }
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn scan(&self, table: &str) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default())
    }
}

/// SQLite-backed store; one row per item in the `items` table.
#[derive(Debug, Clone)]
pub struct SqliteTableStore {
    pool: SqlitePool,
}

impl SqliteTableStore {
    /// Connect and run migrations. Accepts `sqlite:path` URLs and
    /// `sqlite::memory:`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let in_memory = database_url.contains(":memory:");
        if !in_memory {
            ensure_parent_dir(database_url).await?;
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every in-memory connection is its own database
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_options.connect_with(options).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn insert(&self, table: &str, item: &Value) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO items (table_name, item) VALUES (?, ?)")
            .bind(table)
            .bind(item.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TableStore for SqliteTableStore {
    async fn scan(&self, table: &str) -> Result<Vec<Value>, StoreError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT item FROM items WHERE table_name = ? ORDER BY id",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| serde_json::from_str(row).map_err(StoreError::from))
            .collect()
    }
}

async fn ensure_parent_dir(database_url: &str) -> Result<(), StoreError> {
    let path = database_url
        .trim_start_matches("sqlite:")
        .trim_start_matches("//")
        .split('?')
        .next()
        .unwrap_or_default();

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_in_memory_scan_unknown_table_is_empty() {
        let store = InMemoryTableStore::new();
        assert!(store.scan("transactions").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_insert_keeps_order() {
        let store = InMemoryTableStore::new();
        store.insert("transactions", json!({"id": 1})).await;
        store.insert("transactions", json!({"id": 2})).await;
        store.insert("other", json!({"id": 3})).await;

        let items = store.scan("transactions").await.unwrap();
        assert_eq!(items, vec![json!({"id": 1}), json!({"id": 2})]);
    }

    #[tokio::test]
    async fn test_sqlite_round_trip_in_order() {
        let store = SqliteTableStore::connect("sqlite::memory:").await.unwrap();
        let first = json!({"id": {"S": "t-1"}, "amount": {"N": "120.50"}});
        let second = json!({"id": {"S": "t-2"}, "category": {"S": "Motor Vehicle"}});
        store.insert("transactions", &first).await.unwrap();
        store.insert("transactions", &second).await.unwrap();
        store.insert("clients", &json!({"id": "c-1"})).await.unwrap();

        let items = store.scan("transactions").await.unwrap();
        assert_eq!(items, vec![first, second]);
    }

    #[tokio::test]
    async fn test_sqlite_file_database_created() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("nested/items.db").display());
        let store = SqliteTableStore::connect(&url).await.unwrap();
        assert!(store.scan("transactions").await.unwrap().is_empty());
    }
}
