//! # Stockscope Store
//!
//! Durable tier of the stockscope cache, backed by a `DuckDB` file.
//!
//! The tier holds one table:
//!
//! | Column | Type | Description |
//! |--------|------|-------------|
//! | `key` | `TEXT PRIMARY KEY` | Composite cache key (`SYMBOL:dataset[:qualifier]`) |
//! | `symbol` | `TEXT` | Normalized symbol, used by per-symbol clears |
//! | `dataset` | `TEXT` | Dataset kind label |
//! | `payload` | `TEXT` | Serialized payload, opaque to this crate |
//! | `written_at_ms` | `BIGINT` | Unix epoch milliseconds of the write |
//!
//! Freshness is not decided here. Callers compare `written_at_ms` against
//! their own per-dataset TTL at read time.
//!
//! ```rust,no_run
//! use stockscope_store::{DurableCache, EntryWrite, StoreConfig};
//!
//! let cache = DurableCache::open(StoreConfig::default())?;
//! cache.put(&EntryWrite {
//!     key: "AAPL:quote",
//!     symbol: "AAPL",
//!     dataset: "quote",
//!     payload: "{}",
//!     written_at_ms: 1_700_000_000_000,
//! })?;
//! assert!(cache.get("AAPL:quote")?.is_some());
//! # Ok::<(), stockscope_store::StoreError>(())
//! ```

pub mod duckdb;

use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ::duckdb::{params, OptionalExt};
use thiserror::Error;
use tracing::debug;

pub use crate::duckdb::{ConnectionPool, PooledConnection};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    symbol TEXT NOT NULL,
    dataset TEXT NOT NULL,
    payload TEXT NOT NULL,
    written_at_ms BIGINT NOT NULL
);
"#;

/// Errors raised by the durable cache tier.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error while preparing the cache directory.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Location and pool sizing of the durable cache.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory for stockscope data.
    pub stockscope_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept around.
    pub max_pool_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::at_home(resolve_stockscope_home())
    }
}

impl StoreConfig {
    /// Config rooted at `home`, with the database at `home/cache/cache.duckdb`.
    pub fn at_home(home: impl Into<PathBuf>) -> Self {
        let stockscope_home = home.into();
        let db_path = stockscope_home.join("cache").join("cache.duckdb");
        Self {
            stockscope_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// A row read back from the durable tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub key: String,
    pub payload: String,
    pub written_at_ms: i64,
}

/// A row to write into the durable tier.
#[derive(Debug, Clone, Copy)]
pub struct EntryWrite<'a> {
    pub key: &'a str,
    pub symbol: &'a str,
    pub dataset: &'a str,
    pub payload: &'a str,
    pub written_at_ms: i64,
}

/// Durable key/value cache surviving process restarts.
///
/// Clones share one pool and one writer slot. Writes are applied one at a
/// time: two open transactions replacing the same key conflict at commit.
#[derive(Clone)]
pub struct DurableCache {
    pool: ConnectionPool,
    write_lock: Arc<Mutex<()>>,
}

impl DurableCache {
    /// Open the cache file described by `config`, creating directories and the
    /// table when missing.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pool = ConnectionPool::open(config.db_path, config.max_pool_size)?;
        Self::initialize(pool)
    }

    /// Open a throwaway in-memory cache.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::initialize(ConnectionPool::in_memory(2)?)
    }

    fn initialize(pool: ConnectionPool) -> Result<Self, StoreError> {
        let connection = pool.acquire()?;
        connection.execute_batch(SCHEMA)?;
        drop(connection);
        Ok(Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn writer(&self) -> MutexGuard<'_, ()> {
        // Guards no data; poisoning is ignored.
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the entry stored under `key`, whatever its age.
    pub fn get(&self, key: &str) -> Result<Option<StoredEntry>, StoreError> {
        let connection = self.pool.acquire()?;
        let entry = connection
            .query_row(
                "SELECT key, payload, written_at_ms FROM cache_entries WHERE key = ?",
                params![key],
                |row| {
                    Ok(StoredEntry {
                        key: row.get(0)?,
                        payload: row.get(1)?,
                        written_at_ms: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    /// Replace the entry under `entry.key` in a single transaction.
    pub fn put(&self, entry: &EntryWrite<'_>) -> Result<(), StoreError> {
        let _writer = self.writer();
        let mut connection = self.pool.acquire()?;
        let transaction = connection.transaction()?;
        transaction.execute(
            "INSERT OR REPLACE INTO cache_entries \
             (key, symbol, dataset, payload, written_at_ms) \
             VALUES (?, ?, ?, ?, ?)",
            params![
                entry.key,
                entry.symbol,
                entry.dataset,
                entry.payload,
                entry.written_at_ms
            ],
        )?;
        transaction.commit()?;
        debug!(key = entry.key, "durable cache entry written");
        Ok(())
    }

    /// Remove every entry belonging to `symbol`. Returns the number of rows removed.
    pub fn delete_symbol(&self, symbol: &str) -> Result<usize, StoreError> {
        let _writer = self.writer();
        let connection = self.pool.acquire()?;
        let removed = connection.execute(
            "DELETE FROM cache_entries WHERE symbol = ?",
            params![symbol],
        )?;
        Ok(removed)
    }

    /// Remove every entry.
    pub fn delete_all(&self) -> Result<usize, StoreError> {
        let _writer = self.writer();
        let connection = self.pool.acquire()?;
        let removed = connection.execute("DELETE FROM cache_entries", [])?;
        Ok(removed)
    }

    /// Number of stored entries, fresh or not.
    pub fn len(&self) -> Result<usize, StoreError> {
        let connection = self.pool.acquire()?;
        let count: i64 =
            connection.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

fn resolve_stockscope_home() -> PathBuf {
    if let Some(path) = env::var_os("STOCKSCOPE_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".stockscope");
    }

    PathBuf::from(".stockscope")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write<'a>(key: &'a str, symbol: &'a str, payload: &'a str, at: i64) -> EntryWrite<'a> {
        EntryWrite {
            key,
            symbol,
            dataset: "quote",
            payload,
            written_at_ms: at,
        }
    }

    #[test]
    fn put_replaces_whole_entry() {
        let cache = DurableCache::in_memory().expect("open");

        cache.put(&write("AAPL:quote", "AAPL", "first", 1)).expect("put");
        cache.put(&write("AAPL:quote", "AAPL", "second", 2)).expect("put");

        let entry = cache.get("AAPL:quote").expect("get").expect("present");
        assert_eq!(entry.payload, "second");
        assert_eq!(entry.written_at_ms, 2);
        assert_eq!(cache.len().expect("len"), 1);
    }

    #[test]
    fn delete_symbol_leaves_other_symbols() {
        let cache = DurableCache::in_memory().expect("open");
        cache.put(&write("AAPL:quote", "AAPL", "a", 1)).expect("put");
        cache.put(&write("AAPL:overview", "AAPL", "b", 1)).expect("put");
        cache.put(&write("MSFT:quote", "MSFT", "c", 1)).expect("put");

        assert_eq!(cache.delete_symbol("AAPL").expect("delete"), 2);
        assert!(cache.get("AAPL:quote").expect("get").is_none());
        assert!(cache.get("MSFT:quote").expect("get").is_some());
    }

    #[test]
    fn concurrent_puts_on_one_key_all_commit() {
        let cache = DurableCache::in_memory().expect("open");
        let payloads: Vec<String> = (0..8).map(|writer| format!("w{writer}")).collect();

        let results: Vec<Result<(), StoreError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = payloads
                .iter()
                .enumerate()
                .map(|(writer, payload)| {
                    let cache = cache.clone();
                    scope.spawn(move || {
                        (0..10).try_for_each(|round| {
                            cache.put(&write("AAPL:quote", "AAPL", payload, round * 8 + writer as i64))
                        })
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("writer thread"))
                .collect()
        });

        for result in results {
            result.expect("every put commits");
        }
        let entry = cache.get("AAPL:quote").expect("get").expect("present");
        assert!(payloads.contains(&entry.payload));
        assert_eq!(cache.len().expect("len"), 1);
    }

    #[test]
    fn entries_survive_reopen() {
        let temp = tempdir().expect("tempdir");
        let config = StoreConfig::at_home(temp.path().join("home"));

        {
            let cache = DurableCache::open(config.clone()).expect("open");
            cache.put(&write("SPY:history", "SPY", "[]", 42)).expect("put");
        }

        let reopened = DurableCache::open(config).expect("reopen");
        let entry = reopened.get("SPY:history").expect("get").expect("present");
        assert_eq!(entry.written_at_ms, 42);
    }
}
