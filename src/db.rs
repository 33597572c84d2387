//! Single-factory `VectorStore` construction and the bounded table cache.
//!
//! Every other component obtains a store handle through [`get_vector_store`];
//! no other function in this crate is permitted to call `SqlitePool::connect`
//! directly for the tool/knowledge/graph tables (Invariant §4.1, tested by
//! `tests/single_factory.rs`).
//!
//! The concrete storage technology is SQLite via `sqlx`, matching the rest of
//! this codebase's persistence layer. The columnar naming in the public API
//! (`open_or_create`, `project_scan`) mirrors the Arrow-native vocabulary of
//! the system this core replaces; the physical rows live in ordinary SQLite
//! tables with dictionary-style indexed text columns.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock};

use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::migrate;

/// A process-wide handle to one storage path's tables.
pub struct VectorStore {
    pub pool: SqlitePool,
    pub dimension: usize,
}

impl VectorStore {
    /// Returns the raw row count of a table. Used by tests and `stats`.
    pub async fn count(&self, table: &str) -> CoreResult<i64> {
        let sql = match table {
            "tools" => "SELECT COUNT(*) FROM tools",
            "knowledge" => "SELECT COUNT(*) FROM knowledge_chunks",
            "kg_entities" => "SELECT COUNT(*) FROM kg_entities",
            "kg_relations" => "SELECT COUNT(*) FROM kg_relations",
            other => return Err(CoreError::TableNotFound(other.to_string())),
        };
        let count: i64 = sqlx::query_scalar(sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}

struct StoreCache {
    max_entries: usize,
    entries: HashMap<PathBuf, Arc<VectorStore>>,
    lru_order: Vec<PathBuf>,
}

impl StoreCache {
    fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            entries: HashMap::new(),
            lru_order: Vec::new(),
        }
    }

    fn touch(&mut self, key: &Path) {
        self.lru_order.retain(|k| k != key);
        self.lru_order.push(key.to_path_buf());
    }

    fn insert(&mut self, key: PathBuf, value: Arc<VectorStore>) {
        self.entries.insert(key.clone(), value);
        self.touch(&key);
        while self.entries.len() > self.max_entries {
            if let Some(oldest) = self.lru_order.first().cloned() {
                self.lru_order.remove(0);
                self.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }
}

fn cache() -> &'static Mutex<StoreCache> {
    static CACHE: OnceLock<Mutex<StoreCache>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(StoreCache::new(16)))
}

/// The single construction point for a [`VectorStore`]. Resolves resource
/// limits from `config` (`max_cached_tables`, defaulting to 16) and returns a
/// cached handle if one is already open for this path.
pub async fn get_vector_store(config: &StoreConfig) -> Result<Arc<VectorStore>> {
    let key = config.storage_path.clone();

    {
        let mut guard = cache().lock().unwrap();
        guard.max_entries = config.max_cached_tables;
        if let Some(existing) = guard.entries.get(&key).cloned() {
            guard.touch(&key);
            return Ok(existing);
        }
    }

    let pool = connect(&key).await?;
    migrate::run_migrations(&pool).await?;

    let store = Arc::new(VectorStore {
        pool,
        dimension: config.dimension,
    });

    let mut guard = cache().lock().unwrap();
    guard.insert(key, store.clone());
    Ok(store)
}

async fn connect(storage_path: &Path) -> Result<SqlitePool> {
    let is_memory = storage_path.as_os_str() == ":memory:";
    if !is_memory {
        if let Some(parent) = storage_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let url = if is_memory {
        "sqlite::memory:".to_string()
    } else {
        format!("sqlite:{}", storage_path.display())
    };

    let options = SqliteConnectOptions::from_str(&url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    // A pooled `:memory:` database hands each connection its own empty
    // database, so in-memory stores are pinned to a single connection to
    // keep every query against the same data.
    let max_connections = if is_memory { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_factory_returns_same_handle_for_same_path() {
        let cfg = StoreConfig {
            storage_path: PathBuf::from(":memory:"),
            dimension: 8,
            index_cache_size_bytes: 1024,
            max_cached_tables: 16,
        };
        // Distinct in-memory DBs per connection means this test only checks
        // that the cache key resolves consistently, not pool identity across
        // processes.
        let a = get_vector_store(&cfg).await.unwrap();
        let b = get_vector_store(&cfg).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
