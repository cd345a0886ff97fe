//! History query engine (§4.10): four public operations that merge
//! irreversible rows from stored SQL functions with reversible rows still
//! held in the volatile store, synchronizing with the irreversibility
//! promoter via [`indexer_pipeline::PromotionGate`].

pub mod filter;
pub mod rows;

use std::sync::Arc;

use indexer_core::error::Result;
use indexer_pipeline::PromotionGate;
use indexer_storage::Storage;
use sqlx::{Pool, Postgres, Row};
use tracing::warn;

use filter::{filter_array_sql, operation_filter_to_ids, virtual_filter_to_ids};
use rows::{EnumCursor, OpRow, TransactionDetail};

pub struct QueryEngine {
    pool: Pool<Postgres>,
    storage: Arc<Storage>,
    gate: Arc<PromotionGate>,
}

impl QueryEngine {
    pub fn new(pool: Pool<Postgres>, storage: Arc<Storage>, gate: Arc<PromotionGate>) -> Self {
        Self { pool, storage, gate }
    }

    /// §4.10 op 1.
    pub async fn get_ops_in_block(&self, block: u32, only_virtual: bool, include_reversible: bool) -> Result<Vec<OpRow>> {
        if include_reversible {
            self.gate.synchronize(block).await;
            let volatile = self.storage.volatile.read().await;
            if volatile.contains_block(block) {
                return Ok(volatile
                    .operations_in_block(block)
                    .into_iter()
                    .filter(|op| !only_virtual || op.is_virtual)
                    .map(|op| OpRow::from_operation(op, String::new(), String::new()))
                    .collect());
            }
        }

        let query = sqlx::query(
            "SELECT * FROM ah_get_ops_in_block($1, $2) ORDER BY _trx_in_block, _virtual_op",
        )
        .bind(block as i64)
        .bind(only_virtual);

        let result = query.fetch_all(&self.pool).await;
        let rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, block, "get_ops_in_block sql query failed");
                return Ok(Vec::new());
            }
        };

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(OpRow {
                trx_id: row.try_get("_trx_id")?,
                trx_in_block: row.try_get("_trx_in_block")?,
                op_in_trx: row.try_get("_op_in_trx")?,
                is_virtual: row.try_get("_virtual_op")?,
                timestamp: row.try_get("_timestamp")?,
                body: row.try_get("_body")?,
                operation_id: row.try_get("_operation_id")?,
                block_number: block,
            });
        }
        Ok(out)
    }

    /// §4.10 op 2. Always serves irreversible data; `include_reversible` is
    /// accepted but is a documented no-op (see DESIGN.md open question).
    pub async fn get_transaction(&self, trx_hash: &str, _include_reversible: bool) -> Result<Option<TransactionDetail>> {
        let row = match sqlx::query("SELECT * FROM ah_get_trx($1)").bind(trx_hash).fetch_optional(&self.pool).await {
            Ok(row) => row,
            Err(e) => {
                warn!(error = %e, trx_hash, "get_transaction sql query failed");
                return Ok(None);
            }
        };
        let Some(row) = row else { return Ok(None) };

        let ref_block_num: i32 = row.try_get("_ref_block_num")?;
        let ref_block_prefix: i64 = row.try_get("_ref_block_prefix")?;
        let expiration: String = row.try_get("_expiration")?;
        let block_num: i64 = row.try_get("_block_num")?;
        let transaction_num: i32 = row.try_get("_transaction_num")?;
        let signature: Option<String> = row.try_get("_signature")?;
        let multisig_num: i32 = row.try_get("_multisig_num")?;

        let mut multisig_signatures = Vec::new();
        if multisig_num > 0 {
            if let Ok(sig_rows) = sqlx::query("SELECT * FROM ah_get_multi_sig_in_trx($1)").bind(trx_hash).fetch_all(&self.pool).await {
                for r in sig_rows {
                    multisig_signatures.push(r.try_get::<String, _>(0)?);
                }
            }
        }

        let mut operations = Vec::new();
        if let Ok(op_rows) = sqlx::query("SELECT * FROM ah_get_ops_in_trx($1, $2)")
            .bind(block_num)
            .bind(transaction_num)
            .fetch_all(&self.pool)
            .await
        {
            for r in op_rows {
                operations.push(r.try_get::<String, _>(0)?);
            }
        }

        Ok(Some(TransactionDetail {
            ref_block_num,
            ref_block_prefix,
            expiration,
            block_num,
            transaction_num,
            signature,
            multisig_signatures,
            operations,
        }))
    }

    /// §4.10 op 3. Always serves irreversible data.
    pub async fn get_account_history(
        &self,
        account: &str,
        start: i64,
        limit: i32,
        _include_reversible: bool,
        filter_low: u64,
        filter_high: u64,
    ) -> Result<Vec<(i64, OpRow)>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let ids = operation_filter_to_ids(filter_low, filter_high);
        let filter = filter_array_sql(&ids);
        let sql = format!(
            "SELECT * FROM ah_get_account_history({}, $1, $2, $3) ORDER BY _block, _trx_in_block, _op_in_trx, _virtual_op DESC",
            filter
        );

        let result = sqlx::query(&sql).bind(account).bind(start).bind(limit).fetch_all(&self.pool).await;
        let db_rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, account, "get_account_history sql query failed");
                return Ok(Vec::new());
            }
        };

        let mut out = Vec::with_capacity(db_rows.len());
        for row in db_rows {
            let block_number: i64 = row.try_get("_block")?;
            let op = OpRow {
                trx_id: row.try_get("_trx_id")?,
                trx_in_block: row.try_get("_trx_in_block")?,
                op_in_trx: row.try_get("_op_in_trx")?,
                is_virtual: row.try_get("_virtual_op")?,
                timestamp: row.try_get("_timestamp")?,
                body: row.try_get("_body")?,
                operation_id: row.try_get("_operation_id")?,
                block_number: block_number as u32,
            };
            out.push((op.operation_id, op));
        }
        Ok(out)
    }

    /// §4.10 op 4.
    pub async fn enum_virtual_ops(
        &self,
        block_range: (u32, u32),
        include_reversible: bool,
        operation_begin: i64,
        limit: i32,
        filter: u32,
    ) -> Result<(Vec<OpRow>, EnumCursor)> {
        let (begin, end) = block_range;
        if begin >= end || limit <= 0 {
            return Ok((Vec::new(), EnumCursor::default()));
        }

        let ids = virtual_filter_to_ids(filter);
        let filter_sql = filter_array_sql(&ids);
        let sql = format!(
            "SELECT * FROM ah_get_enum_virtual_ops({}, $1, $2, $3, $4)",
            filter_sql
        );

        let result = sqlx::query(&sql).bind(begin as i64).bind(end as i64).bind(operation_begin).bind(limit).fetch_all(&self.pool).await;
        let mut db_rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, begin, end, "enum_virtual_ops sql query failed");
                Vec::new()
            }
        };

        // The stored function may return one extra row beyond `limit` so the
        // next-page cursor can be derived from it without a second
        // round-trip (the `_next_elements` RPC is the fallback for when it
        // doesn't).
        let mut cursor = EnumCursor::default();
        let mut has_extra_row = false;
        if db_rows.len() as i32 > limit {
            let extra = db_rows.remove(limit as usize);
            let next_block: i64 = extra.try_get("_block")?;
            let next_operation_id: i64 = extra.try_get("_operation_id")?;
            cursor = EnumCursor { next_block: next_block as u32, next_operation_id };
            has_extra_row = true;
            db_rows.truncate(limit as usize);
        }

        let mut out = Vec::with_capacity(db_rows.len());
        for row in db_rows {
            let block_number: i64 = row.try_get("_block")?;
            let op = OpRow {
                trx_id: row.try_get("_trx_id")?,
                trx_in_block: row.try_get("_trx_in_block")?,
                op_in_trx: row.try_get("_op_in_trx")?,
                is_virtual: row.try_get("_virtual_op")?,
                timestamp: row.try_get("_timestamp")?,
                body: row.try_get("_body")?,
                operation_id: row.try_get("_operation_id")?,
                block_number: block_number as u32,
            };
            out.push(op);
        }

        if !has_extra_row && (out.len() as i32) < limit {
            let next_sql = format!(
                "SELECT * FROM ah_get_enum_virtual_ops_next_elements({}, $1, $2)",
                filter_sql
            );
            if let Ok(row) = sqlx::query(&next_sql)
                .bind(begin as i64)
                .bind(operation_begin)
                .fetch_one(&self.pool)
                .await
            {
                if let (Ok(next_block), Ok(next_operation_id)) =
                    (row.try_get::<i64, _>("_next_block"), row.try_get::<i64, _>("_next_operation_id"))
                {
                    cursor = EnumCursor { next_block: next_block as u32, next_operation_id };
                }
            }

            if include_reversible && (out.len() as i32) < limit {
                let volatile = self.storage.volatile.read().await;
                for op in volatile.operations.scan_range(begin, end) {
                    if !op.is_virtual {
                        continue;
                    }
                    if !ids.is_empty() && !ids.contains(&(op.op_type_id as i32)) {
                        continue;
                    }
                    if out.len() as i32 >= limit {
                        break;
                    }
                    out.push(OpRow::from_operation(op, String::new(), String::new()));
                }
            }
        }

        Ok((out, cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexer_core::types::{Operation, OperationBody};
    use indexer_storage::cache::{AccountCache, OperationIdSequence, PermlinkCache};
    use indexer_storage::memory::VolatileStore;

    fn lazy_pool() -> Pool<Postgres> {
        sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy("postgres://localhost/unused")
            .expect("lazy pool construction does not touch the network")
    }

    async fn test_storage_with_block(block: u32) -> Arc<Storage> {
        let mut volatile = VolatileStore::new();
        volatile.operations.insert(
            block,
            1,
            Operation { operation_id: 1, block_number: block, trx_in_block: 0, op_in_trx: 0, op_type_id: 1, is_virtual: false, body: OperationBody::Json("{}".into()) },
        );
        volatile.operations.insert(
            block,
            2,
            Operation { operation_id: 2, block_number: block, trx_in_block: -1, op_in_trx: 0, op_type_id: 52, is_virtual: true, body: OperationBody::Json("{}".into()) },
        );
        volatile.blocks.insert(block, block as i32, indexer_core::types::Block { block_number: block, hash: [0u8; 20], prev_hash: [0u8; 20], created_at: chrono::Utc::now() });

        Arc::new(Storage {
            volatile: tokio::sync::RwLock::new(volatile),
            accounts: AccountCache::new(),
            permlinks: PermlinkCache::new(),
            operation_ids: OperationIdSequence::new(3),
            writers: indexer_storage::postgres::Writers::new(lazy_pool()),
        })
    }

    #[tokio::test]
    async fn get_ops_in_block_serves_volatile_rows_when_present() {
        let storage = test_storage_with_block(5).await;
        let gate = PromotionGate::new();
        let engine = QueryEngine::new(lazy_pool(), Arc::clone(&storage), gate);

        let ops = engine.get_ops_in_block(5, false, true).await.unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].operation_id, 1);
        assert_eq!(ops[1].operation_id, 2);
    }

    #[tokio::test]
    async fn get_ops_in_block_only_virtual_filters_volatile_rows() {
        let storage = test_storage_with_block(5).await;
        let gate = PromotionGate::new();
        let engine = QueryEngine::new(lazy_pool(), Arc::clone(&storage), gate);

        let ops = engine.get_ops_in_block(5, true, true).await.unwrap();
        assert_eq!(ops.len(), 1);
        assert!(ops[0].is_virtual);
    }

    #[tokio::test]
    async fn get_account_history_zero_limit_returns_no_rows() {
        let storage = test_storage_with_block(5).await;
        let gate = PromotionGate::new();
        let engine = QueryEngine::new(lazy_pool(), storage, gate);

        let result = engine.get_account_history("alice", 0, 0, false, 0, 0).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn enum_virtual_ops_empty_range_returns_no_rows() {
        let storage = test_storage_with_block(5).await;
        let gate = PromotionGate::new();
        let engine = QueryEngine::new(lazy_pool(), storage, gate);

        let (ops, cursor) = engine.enum_virtual_ops((5, 5), false, 0, 10, 0).await.unwrap();
        assert!(ops.is_empty());
        assert_eq!(cursor, EnumCursor::default());
    }
}
