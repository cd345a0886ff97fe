//! PostgreSQL-backed persistence: schema bootstrap/index-cycling (§4.9,
//! delegated to [`ddl`]) and the fixed set of per-table writers (§4.3) that
//! the promoter (§4.8) and replay-mode ingestion flush batches into.

pub mod ddl;

use std::sync::Arc;

use indexer_core::types::{Account, AccountOperation, Block, MultiSig, Operation, OperationBody, Permlink, Transaction};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

use crate::escape::{escape_raw, escape_sql};
use crate::memory::PromotionBatch;
use crate::writer::{DataProcessor, TableWriter};
use indexer_core::error::Result;

/// Connects a writer-side `Pool<Postgres>`. Matches the reference stack's
/// `PgPoolOptions`-based construction.
pub async fn connect(url: &str, max_connections: u32) -> Result<Pool<Postgres>> {
    let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

fn fmt_account(row: &Account) -> String {
    format!("{},{}", row.account_id, escape_sql(&row.name))
}

fn fmt_permlink(row: &Permlink) -> String {
    format!("{},{}", row.permlink_id, escape_sql(&row.text))
}

fn fmt_block(row: &Block) -> String {
    format!(
        "{},{},{},'{}'",
        row.block_number,
        escape_raw(Some(&row.hash)),
        escape_raw(Some(&row.prev_hash)),
        row.created_at.to_rfc3339(),
    )
}

fn fmt_transaction(row: &Transaction) -> String {
    format!(
        "{},{},{},{},{},'{}',{}",
        row.block_number,
        escape_raw(Some(&row.hash)),
        row.trx_in_block,
        row.ref_block_num,
        row.ref_block_prefix,
        row.expiration.to_rfc3339(),
        escape_raw(row.primary_signature.as_ref().map(|s| s.as_slice())),
    )
}

fn fmt_multisig(row: &MultiSig) -> String {
    format!("{},{}", escape_raw(Some(&row.transaction_hash)), escape_raw(Some(&row.signature)))
}

fn fmt_operation(row: &Operation) -> String {
    let body = match &row.body {
        OperationBody::Json(s) => escape_sql(s),
        OperationBody::Packed(bytes) => escape_sql(&format!("\\x{}", hex::encode(bytes))),
    };
    // permlink_ids was designed but never activated upstream; persisted as
    // NULL::int[] unconditionally (see DESIGN.md).
    format!(
        "{},{},{},{},{},{},NULL::int[]",
        row.operation_id, row.block_number, row.trx_in_block, row.op_in_trx, row.op_type_id, body,
    )
}

fn fmt_account_operation(row: &AccountOperation) -> String {
    format!("{},{},{}", row.operation_id, row.account_id, row.operation_seq_no)
}

/// The seven fixed-order persisted table writers (§4.8 drain order).
pub struct Writers {
    pub accounts: TableWriter<Account>,
    pub permlinks: TableWriter<Permlink>,
    pub blocks: TableWriter<Block>,
    pub transactions: TableWriter<Transaction>,
    pub multisigs: TableWriter<MultiSig>,
    pub operations: TableWriter<Operation>,
    pub account_operations: TableWriter<AccountOperation>,
}

impl Writers {
    /// Spawn one [`DataProcessor`] per table, each owning a connection
    /// cloned from `pool` (sqlx pools are themselves cheaply-cloneable
    /// handles, so each writer's worker competes for the pool's connections
    /// rather than holding one exclusively — acceptable because the table
    /// writers' statements are independent per §4.1's "connections are
    /// interchangeable").
    pub fn new(pool: Pool<Postgres>) -> Self {
        let proc_for = |name: &'static str| Arc::new(DataProcessor::spawn(pool.clone(), name));

        Self {
            accounts: TableWriter::new(proc_for("hive_accounts"), "hive_accounts", &["id", "name"], fmt_account),
            permlinks: TableWriter::new(proc_for("hive_permlink_data"), "hive_permlink_data", &["id", "permlink"], fmt_permlink),
            blocks: TableWriter::new(proc_for("hive_blocks"), "hive_blocks", &["num", "hash", "prev", "created_at"], fmt_block),
            transactions: TableWriter::new(
                proc_for("hive_transactions"),
                "hive_transactions",
                &["block_num", "trx_hash", "trx_in_block", "ref_block_num", "ref_block_prefix", "expiration", "signature"],
                fmt_transaction,
            ),
            multisigs: TableWriter::new(
                proc_for("hive_transactions_multisig"),
                "hive_transactions_multisig",
                &["trx_hash", "signature"],
                fmt_multisig,
            ),
            operations: TableWriter::new(
                proc_for("hive_operations"),
                "hive_operations",
                &["id", "block_num", "trx_in_block", "op_pos", "op_type_id", "body", "permlink_ids"],
                fmt_operation,
            ),
            account_operations: TableWriter::new(
                proc_for("hive_account_operations"),
                "hive_account_operations",
                &["operation_id", "account_id", "account_op_seq_no"],
                fmt_account_operation,
            ),
        }
    }

    /// Flush a [`PromotionBatch`] in the fixed table order §4.8 specifies.
    pub fn flush_batch(&self, batch: PromotionBatch) {
        self.accounts.flush(batch.accounts);
        self.permlinks.flush(batch.permlinks);
        self.blocks.flush(batch.blocks);
        self.transactions.flush(batch.transactions);
        self.multisigs.flush(batch.multisigs);
        self.operations.flush(batch.operations);
        self.account_operations.flush(batch.account_operations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn fmt_account_embeds_escaped_name() {
        assert_eq!(fmt_account(&Account { account_id: 1, name: "alice".into() }), "1,E'alice'");
    }

    #[test]
    fn fmt_transaction_nulls_absent_signature() {
        let tx = Transaction {
            block_number: 1,
            trx_in_block: 0,
            hash: [0u8; 20],
            ref_block_num: 1,
            ref_block_prefix: 2,
            expiration: Utc::now(),
            primary_signature: None,
        };
        assert!(fmt_transaction(&tx).ends_with("NULL"));
    }

    #[test]
    fn fmt_operation_always_nulls_permlink_ids() {
        let op = Operation {
            operation_id: 1,
            block_number: 1,
            trx_in_block: 0,
            op_in_trx: 0,
            op_type_id: 1,
            is_virtual: false,
            body: OperationBody::Json("{}".into()),
        };
        assert!(fmt_operation(&op).ends_with("NULL::int[]"));
    }
}
