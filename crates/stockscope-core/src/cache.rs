//! Two-tier cache for resolved datasets.
//!
//! The memory tier is a `tokio` `RwLock` over a map and starts empty with every
//! process. The optional durable tier is a [`DurableCache`] file shared across
//! runs. TTLs are enforced at read time from the entry's write timestamp, so
//! an expired entry stays on disk until it is overwritten or cleared and can
//! still be served through [`CacheStore::get_stale`].
//!
//! The memory tier drops an expired entry once it outlives its stale
//! retention: immediately when the durable tier holds a copy, otherwise
//! [`DEFAULT_STALE_RETENTION`] past its TTL. Writes and clears are applied
//! one at a time across both tiers, so the last write to finish is the one
//! both tiers hold.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use stockscope_store::{DurableCache, EntryWrite, StoreError};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::{DatasetKind, Symbol, UtcDateTime};

/// How long a memory-only store keeps an expired entry for the stale path.
pub const DEFAULT_STALE_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("durable cache error: {0}")]
    Store(#[from] StoreError),

    #[error("cache payload could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Composite cache key: `SYMBOL:dataset[:qualifier]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    symbol: Symbol,
    kind: DatasetKind,
    qualifier: Option<String>,
}

impl CacheKey {
    pub fn new(symbol: Symbol, kind: DatasetKind) -> Self {
        Self {
            symbol,
            kind,
            qualifier: None,
        }
    }

    /// Distinguishes variants of one dataset, such as indicator lookbacks.
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn kind(&self) -> DatasetKind {
        self.kind
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.symbol, self.kind)?;
        if let Some(qualifier) = &self.qualifier {
            write!(f, ":{qualifier}")?;
        }
        Ok(())
    }
}

/// Time-to-live per dataset kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub quote: Duration,
    pub overview: Duration,
    pub history: Duration,
    pub news: Duration,
    pub indicators: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            quote: Duration::from_secs(60 * 60),
            overview: Duration::from_secs(60 * 60),
            history: Duration::from_secs(6 * 60 * 60),
            news: Duration::from_secs(60 * 60),
            indicators: Duration::from_secs(30 * 60),
        }
    }
}

impl CacheTtls {
    /// Every kind shares `ttl`. A zero TTL makes every entry stale on arrival.
    pub const fn uniform(ttl: Duration) -> Self {
        Self {
            quote: ttl,
            overview: ttl,
            history: ttl,
            news: ttl,
            indicators: ttl,
        }
    }

    pub const fn ttl_for(&self, kind: DatasetKind) -> Duration {
        match kind {
            DatasetKind::Quote => self.quote,
            DatasetKind::Overview => self.overview,
            DatasetKind::History => self.history,
            DatasetKind::News => self.news,
            DatasetKind::Indicators => self.indicators,
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    symbol: String,
    kind: DatasetKind,
    payload: String,
    written_at_ms: i64,
}

#[derive(Debug, Default)]
struct CacheInner {
    map: HashMap<String, MemoryEntry>,
}

impl CacheInner {
    fn get(&self, key: &str) -> Option<&MemoryEntry> {
        self.map.get(key)
    }

    fn put(&mut self, key: String, entry: MemoryEntry) {
        self.map.insert(key, entry);
    }

    /// Remove `key` unless it was rewritten since it was read at `written_at_ms`.
    fn evict_if_unchanged(&mut self, key: &str, written_at_ms: i64) -> bool {
        if self
            .map
            .get(key)
            .is_some_and(|entry| entry.written_at_ms == written_at_ms)
        {
            self.map.remove(key);
            return true;
        }
        false
    }

    fn prune(&mut self, mut expired: impl FnMut(&MemoryEntry) -> bool) -> usize {
        let before = self.map.len();
        self.map.retain(|_, entry| !expired(entry));
        before - self.map.len()
    }

    fn clear_symbol(&mut self, symbol: &str) -> usize {
        let before = self.map.len();
        self.map.retain(|_, entry| entry.symbol != symbol);
        before - self.map.len()
    }

    fn clear(&mut self) -> usize {
        let removed = self.map.len();
        self.map.clear();
        removed
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

/// Thread-safe two-tier cache. Clones share both tiers.
#[derive(Clone)]
pub struct CacheStore {
    memory: Arc<RwLock<CacheInner>>,
    durable: Option<DurableCache>,
    /// Held across the durable and memory halves of writes, clears and
    /// durable-to-memory copies.
    write_gate: Arc<Mutex<()>>,
    ttls: CacheTtls,
    stale_retention: Duration,
}

impl CacheStore {
    /// Memory tier only; nothing survives the process.
    pub fn in_memory(ttls: CacheTtls) -> Self {
        Self {
            memory: Arc::new(RwLock::new(CacheInner::default())),
            durable: None,
            write_gate: Arc::new(Mutex::new(())),
            ttls,
            stale_retention: DEFAULT_STALE_RETENTION,
        }
    }

    /// Memory tier in front of `durable`. Expired entries leave the memory
    /// tier at once; the stale path reads them from `durable`.
    pub fn with_durable(durable: DurableCache, ttls: CacheTtls) -> Self {
        Self {
            durable: Some(durable),
            stale_retention: Duration::ZERO,
            ..Self::in_memory(ttls)
        }
    }

    /// How long past its TTL an entry stays in the memory tier.
    pub fn with_stale_retention(mut self, stale_retention: Duration) -> Self {
        self.stale_retention = stale_retention;
        self
    }

    pub fn ttls(&self) -> CacheTtls {
        self.ttls
    }

    /// Fresh payload under `key`, if any.
    ///
    /// A fresh durable entry is copied into the memory tier on the way out.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let ttl = self.ttls.ttl_for(key.kind());
        let raw_key = key.to_string();
        let now = now_ms();

        let expired_at = match self.memory.read().await.get(&raw_key) {
            Some(entry) if is_fresh(entry.written_at_ms, now, ttl) => {
                debug!(key = %raw_key, tier = "memory", "cache hit");
                return Ok(Some(entry.payload.clone()));
            }
            Some(entry) => Some(entry.written_at_ms),
            None => None,
        };
        if let Some(written_at_ms) =
            expired_at.filter(|written_at_ms| self.outlives_retention(key.kind(), *written_at_ms, now))
        {
            if self.memory.write().await.evict_if_unchanged(&raw_key, written_at_ms) {
                debug!(key = %raw_key, "expired memory entry evicted");
            }
        }

        if self.durable.is_none() {
            debug!(key = %raw_key, "cache miss");
            return Ok(None);
        }
        let _gate = self.write_gate.lock().await;
        let Some(stored) = self.read_durable(&raw_key).await? else {
            debug!(key = %raw_key, "cache miss");
            return Ok(None);
        };
        if !is_fresh(stored.written_at_ms, now, ttl) {
            debug!(key = %raw_key, "cache entry expired");
            return Ok(None);
        }

        debug!(key = %raw_key, tier = "durable", "cache hit");
        self.memory.write().await.put(
            raw_key,
            MemoryEntry {
                symbol: key.symbol().to_string(),
                kind: key.kind(),
                payload: stored.payload.clone(),
                written_at_ms: stored.written_at_ms,
            },
        );
        Ok(Some(stored.payload))
    }

    /// Payload under `key` regardless of TTL, with its age.
    pub async fn get_stale(
        &self,
        key: &CacheKey,
    ) -> Result<Option<(String, Duration)>, CacheError> {
        let raw_key = key.to_string();
        let now = now_ms();

        if let Some(entry) = self.memory.read().await.get(&raw_key) {
            return Ok(Some((entry.payload.clone(), age(entry.written_at_ms, now))));
        }

        Ok(self
            .read_durable(&raw_key)
            .await?
            .map(|stored| (stored.payload, age(stored.written_at_ms, now))))
    }

    /// Overwrite `key` with `payload`, stamped now.
    ///
    /// The write runs on its own task: once started it completes in both tiers
    /// even if the caller's future is dropped.
    pub async fn set(&self, key: &CacheKey, payload: String) -> Result<(), CacheError> {
        let store = self.clone();
        let raw_key = key.to_string();
        let symbol = key.symbol().to_string();
        let dataset = key.kind();

        tokio::spawn(async move { store.write_entry(raw_key, symbol, dataset, payload).await })
            .await?
    }

    async fn write_entry(
        &self,
        key: String,
        symbol: String,
        dataset: DatasetKind,
        payload: String,
    ) -> Result<(), CacheError> {
        let _gate = self.write_gate.lock().await;
        // Stamped under the gate so write order and timestamp order agree.
        let written_at_ms = now_ms();

        if let Some(durable) = self.durable.clone() {
            let (key, symbol, payload) = (key.clone(), symbol.clone(), payload.clone());
            tokio::task::spawn_blocking(move || {
                durable.put(&EntryWrite {
                    key: &key,
                    symbol: &symbol,
                    dataset: dataset.as_str(),
                    payload: &payload,
                    written_at_ms,
                })
            })
            .await??;
        }

        debug!(key = %key, "cache entry written");
        let mut memory = self.memory.write().await;
        let pruned = memory.prune(|entry| {
            self.outlives_retention(entry.kind, entry.written_at_ms, written_at_ms)
        });
        if pruned > 0 {
            debug!(pruned, "expired memory entries evicted");
        }
        memory.put(
            key,
            MemoryEntry {
                symbol,
                kind: dataset,
                payload,
                written_at_ms,
            },
        );
        Ok(())
    }

    fn outlives_retention(&self, kind: DatasetKind, written_at_ms: i64, now_ms: i64) -> bool {
        let retention = self.ttls.ttl_for(kind).saturating_add(self.stale_retention);
        !is_fresh(written_at_ms, now_ms, retention)
    }

    /// Drop every dataset cached for `symbol` from both tiers.
    pub async fn clear(&self, symbol: &Symbol) -> Result<usize, CacheError> {
        let _gate = self.write_gate.lock().await;
        let from_memory = self.memory.write().await.clear_symbol(symbol.as_str());
        let from_durable = match self.durable.clone() {
            Some(durable) => {
                let symbol = symbol.to_string();
                tokio::task::spawn_blocking(move || durable.delete_symbol(&symbol)).await??
            }
            None => 0,
        };
        Ok(from_memory.max(from_durable))
    }

    pub async fn clear_all(&self) -> Result<usize, CacheError> {
        let _gate = self.write_gate.lock().await;
        let from_memory = self.memory.write().await.clear();
        let from_durable = match self.durable.clone() {
            Some(durable) => tokio::task::spawn_blocking(move || durable.delete_all()).await??,
            None => 0,
        };
        Ok(from_memory.max(from_durable))
    }

    /// Number of entries in the memory tier, fresh or not.
    pub async fn len(&self) -> usize {
        self.memory.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Fresh value under `key`, decoded from JSON.
    ///
    /// An undecodable payload is treated as a miss.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> Result<Option<T>, CacheError> {
        Ok(self
            .get(key)
            .await?
            .and_then(|payload| decode(key, &payload)))
    }

    pub async fn get_stale_json<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> Result<Option<(T, Duration)>, CacheError> {
        Ok(self
            .get_stale(key)
            .await?
            .and_then(|(payload, age)| decode(key, &payload).map(|value| (value, age))))
    }

    pub async fn set_json<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<(), CacheError> {
        let payload = serde_json::to_string(value)?;
        self.set(key, payload).await
    }

    async fn read_durable(
        &self,
        key: &str,
    ) -> Result<Option<stockscope_store::StoredEntry>, CacheError> {
        let Some(durable) = self.durable.clone() else {
            return Ok(None);
        };
        let key = key.to_owned();
        Ok(tokio::task::spawn_blocking(move || durable.get(&key)).await??)
    }
}

fn decode<T: DeserializeOwned>(key: &CacheKey, payload: &str) -> Option<T> {
    match serde_json::from_str(payload) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(key = %key, %error, "discarding undecodable cache payload");
            None
        }
    }
}

fn now_ms() -> i64 {
    UtcDateTime::now().unix_millis()
}

fn age(written_at_ms: i64, now_ms: i64) -> Duration {
    Duration::from_millis(u64::try_from(now_ms - written_at_ms).unwrap_or_default())
}

/// Fresh iff younger than `ttl`; a zero TTL is never fresh.
fn is_fresh(written_at_ms: i64, now_ms: i64, ttl: Duration) -> bool {
    age(written_at_ms, now_ms) < ttl
}
