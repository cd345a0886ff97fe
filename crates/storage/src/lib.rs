//! Storage layer: the volatile store (§4.4), id-caches and sequence
//! recovery (§4.5), the bespoke SQL string escaping (§4.3/§6), and the
//! PostgreSQL-backed table writers (§4.2/§4.3/§4.9).

pub mod cache;
pub mod escape;
pub mod memory;
pub mod postgres;
pub mod writer;

pub use indexer_core::error::{Error, Result};

use cache::{AccountCache, OperationIdSequence, PermlinkCache};
use memory::VolatileStore;
use postgres::Writers;
use tracing::info;

/// Ties the volatile store, id-caches, sequence counters, and per-table
/// writers together. Owned by the ingestion pipeline; the query engine only
/// ever touches `volatile` (read-only) and `psql_block_number`.
pub struct Storage {
    pub volatile: tokio::sync::RwLock<VolatileStore>,
    pub accounts: AccountCache,
    pub permlinks: PermlinkCache,
    pub operation_ids: OperationIdSequence,
    pub writers: Writers,
}

impl Storage {
    /// Recover caches and sequences from an existing database, then wire up
    /// the fixed-order table writers against the same pool (§4.5).
    ///
    /// `builtin_accounts` are account names the embedding node's state index
    /// already knows about at genesis (e.g. `initminer`, `null`, `temp`).
    /// Any not yet present in `hive_accounts` are inserted once here, ahead
    /// of ordinary ingestion — a one-time bootstrap, not something ingestion
    /// itself should have to special-case.
    pub async fn recover(pool: sqlx::Pool<sqlx::Postgres>, builtin_accounts: &[String]) -> Result<Self> {
        let accounts = AccountCache::recover(&pool).await?;
        let permlinks = PermlinkCache::recover(&pool).await?;
        let operation_ids = OperationIdSequence::recover(&pool).await?;

        let missing = accounts.missing_from(builtin_accounts).await;
        for name in &missing {
            let id = accounts.insert_new(name).await;
            sqlx::query("INSERT INTO hive_accounts(id, name) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(id)
                .bind(name)
                .execute(&pool)
                .await?;
        }
        if !missing.is_empty() {
            info!(count = missing.len(), "inserted built-in accounts missing from hive_accounts");
        }

        let writers = Writers::new(pool);

        Ok(Self {
            volatile: tokio::sync::RwLock::new(VolatileStore::new()),
            accounts,
            permlinks,
            operation_ids,
            writers,
        })
    }
}
