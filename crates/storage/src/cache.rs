//! Id-cache and sequence recovery (§4.5).
//!
//! Caches only grow during a process lifetime: entries are never mutated or
//! removed once inserted, which is what lets writer-worker closures read a
//! cloned handle without synchronizing against the ingestion thread (§5).

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::{Pool, Postgres, Row};
use tokio::sync::RwLock;

use indexer_core::error::Result;

#[derive(Debug, Clone, Default)]
struct AccountEntry {
    id: i32,
    operation_count: i32,
}

/// Maps account name -> (account id, per-account operation counter).
/// Cloneable handle backed by a shared, append-only map.
#[derive(Clone)]
pub struct AccountCache {
    inner: Arc<RwLock<HashMap<String, AccountEntry>>>,
    next_id: Arc<std::sync::atomic::AtomicI32>,
}

impl AccountCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(std::sync::atomic::AtomicI32::new(1)),
        }
    }

    /// Recover from SQL: load every `(id, name, operation_count)` row and
    /// set the next-id counter to one past the max loaded id.
    pub async fn recover(pool: &Pool<Postgres>) -> Result<Self> {
        let cache = Self::new();
        let rows = sqlx::query(
            "SELECT a.id, a.name, COUNT(ao.operation_id)::int AS operation_count \
             FROM hive_accounts a LEFT JOIN hive_account_operations ao ON ao.account_id = a.id \
             GROUP BY a.id, a.name",
        )
        .fetch_all(pool)
        .await?;

        let mut map = cache.inner.write().await;
        let mut max_id = 0i32;
        for row in rows {
            let id: i32 = row.try_get("id")?;
            let name: String = row.try_get("name")?;
            let operation_count: i32 = row.try_get("operation_count")?;
            max_id = max_id.max(id);
            map.insert(name, AccountEntry { id, operation_count });
        }
        drop(map);
        cache.next_id.store(max_id + 1, std::sync::atomic::Ordering::SeqCst);
        Ok(cache)
    }

    pub async fn get_id(&self, name: &str) -> Option<i32> {
        self.inner.read().await.get(name).map(|e| e.id)
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.inner.read().await.contains_key(name)
    }

    /// Assign and record a new account id for `name`, returning it.
    /// Strictly increasing and never reused (§3).
    pub async fn insert_new(&self, name: &str) -> i32 {
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.inner.write().await.insert(name.to_string(), AccountEntry { id, operation_count: 0 });
        id
    }

    /// Return the current operation-count for `name` and increment it.
    /// Used to compute `AccountOperation::operation_seq_no` (§3 invariant:
    /// seq_no equals the number of prior operations impacting the account).
    pub async fn next_operation_seq_no(&self, name: &str) -> Option<i32> {
        let mut map = self.inner.write().await;
        let entry = map.get_mut(name)?;
        let seq = entry.operation_count;
        entry.operation_count += 1;
        Some(seq)
    }

    pub async fn next_account_id_preview(&self) -> i32 {
        self.next_id.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Names from `builtins` not already present in the cache, in the order
    /// given. Used at startup to find built-in/genesis accounts the node's
    /// state index already knows about but SQL hasn't seen yet (§4.5).
    pub async fn missing_from(&self, builtins: &[String]) -> Vec<String> {
        let map = self.inner.read().await;
        builtins.iter().filter(|name| !map.contains_key(name.as_str())).cloned().collect()
    }
}

impl Default for AccountCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps permlink text -> permlink id. Same append-only discipline as
/// [`AccountCache`].
#[derive(Clone)]
pub struct PermlinkCache {
    inner: Arc<RwLock<HashMap<String, i32>>>,
    next_id: Arc<std::sync::atomic::AtomicI32>,
}

impl PermlinkCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(std::sync::atomic::AtomicI32::new(1)),
        }
    }

    pub async fn recover(pool: &Pool<Postgres>) -> Result<Self> {
        let cache = Self::new();
        let rows = sqlx::query("SELECT id, permlink FROM hive_permlink_data").fetch_all(pool).await?;

        let mut map = cache.inner.write().await;
        let mut max_id = 0i32;
        for row in rows {
            let id: i32 = row.try_get("id")?;
            let text: String = row.try_get("permlink")?;
            max_id = max_id.max(id);
            map.insert(text, id);
        }
        drop(map);
        cache.next_id.store(max_id + 1, std::sync::atomic::Ordering::SeqCst);
        Ok(cache)
    }

    pub async fn get_id(&self, text: &str) -> Option<i32> {
        self.inner.read().await.get(text).copied()
    }

    /// Comment-edit reuses the existing id; only a never-before-seen
    /// permlink text gets a new one (§3, §4.7).
    pub async fn get_or_insert(&self, text: &str) -> i32 {
        if let Some(id) = self.get_id(text).await {
            return id;
        }
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.inner.write().await.entry(text.to_string()).or_insert(id);
        id
    }
}

impl Default for PermlinkCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotone operation-id counter, recovered at startup from
/// `MAX(hive_operations.id) + 1` (§4.5, §8 scenario 4).
pub struct OperationIdSequence {
    next: std::sync::atomic::AtomicI64,
}

impl OperationIdSequence {
    pub fn new(next: i64) -> Self {
        Self { next: std::sync::atomic::AtomicI64::new(next) }
    }

    pub async fn recover(pool: &Pool<Postgres>) -> Result<Self> {
        let row = sqlx::query("SELECT COALESCE(MAX(id), 0)::bigint AS max_id FROM hive_operations")
            .fetch_one(pool)
            .await?;
        let max_id: i64 = row.try_get("max_id")?;
        Ok(Self::new(max_id + 1))
    }

    pub fn next_id(&self) -> i64 {
        self.next.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
    }
}

/// Recovered at startup from `MAX(hive_blocks.num)`: the chain position the
/// writer pool has already persisted. Drives §4.9's index-cycling decision.
pub async fn recover_psql_block_number(pool: &Pool<Postgres>) -> Result<u64> {
    let row = sqlx::query("SELECT COALESCE(MAX(num), 0)::bigint AS max_num FROM hive_blocks")
        .fetch_one(pool)
        .await?;
    let max_num: i64 = row.try_get("max_num")?;
    Ok(max_num.max(0) as u64)
}
