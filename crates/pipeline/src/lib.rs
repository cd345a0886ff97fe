//! Ingestion pipeline (§4.6): pre-operation/post-block node-notification
//! hooks, new-id discovery (§4.7, [`discovery`]), and the irreversibility
//! promoter (§4.8, [`promoter`]).

pub mod discovery;
pub mod promoter;

use std::sync::atomic::{AtomicI16, AtomicI32, Ordering};
use std::sync::Arc;

use indexer_core::error::{Error, Result};
use indexer_core::types::{Account, AccountOperation, Block, IngestionMode, MultiSig, Operation, Permlink, RawOperation, Transaction};
use indexer_storage::memory::PromotionBatch;
use indexer_storage::Storage;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub use promoter::PromotionGate;

/// Drives `pre_operation`/`post_block` node notifications into the storage
/// layer, routing rows to the volatile store (live mode) or straight into
/// batch buffers (replay mode) per §4.6.
pub struct IngestionPipeline {
    pub storage: Arc<Storage>,
    pub mode: IngestionMode,
    pub blocks_per_commit: u32,
    /// Reset to 0 at the start of every block; assigns `op_in_trx` to
    /// virtual operations with `trx_in_block < 0` (§4.6 step 4).
    block_vops: AtomicI16,
    multisig_seq: AtomicI32,
    /// Only populated in [`IngestionMode::Replay`]; stays empty (and thus
    /// flushes as a no-op) in live mode, where rows live in the volatile
    /// store until promotion.
    replay_batch: Mutex<PromotionBatch>,
}

impl IngestionPipeline {
    pub fn new(storage: Arc<Storage>, mode: IngestionMode) -> Self {
        Self {
            storage,
            mode,
            blocks_per_commit: mode.default_blocks_per_commit(),
            block_vops: AtomicI16::new(0),
            multisig_seq: AtomicI32::new(0),
            replay_batch: Mutex::new(PromotionBatch::default()),
        }
    }

    pub fn with_blocks_per_commit(mut self, blocks_per_commit: u32) -> Self {
        self.blocks_per_commit = blocks_per_commit;
        self
    }

    /// §4.6 pre-operation hook.
    pub async fn pre_operation(&self, raw: RawOperation, block_number: u32, is_block_producing: bool) -> Result<()> {
        if is_block_producing {
            return Ok(());
        }

        let operation_id = self.storage.operation_ids.next_id();

        if !raw.kind.is_virtual() {
            self.discover_and_assign(&raw, block_number).await?;
        }

        let op_in_trx = if raw.kind.is_virtual() && raw.trx_in_block < 0 {
            self.block_vops.fetch_add(1, Ordering::SeqCst)
        } else {
            raw.op_in_trx
        };

        let operation = Operation {
            operation_id,
            block_number,
            trx_in_block: raw.trx_in_block,
            op_in_trx,
            op_type_id: raw.kind.id(),
            is_virtual: raw.kind.is_virtual(),
            body: raw.body.clone(),
        };

        match self.mode {
            IngestionMode::Live => {
                self.storage.volatile.write().await.operations.insert(block_number, operation_id, operation);
            }
            IngestionMode::Replay => {
                self.replay_batch.lock().await.operations.push(operation);
            }
        }

        for name in &raw.accounts_impacted {
            let account_id = self
                .storage
                .accounts
                .get_id(name)
                .await
                .ok_or_else(|| Error::consistency(format!("account '{}' impacted but missing from cache", name)))?;
            let operation_seq_no = self
                .storage
                .accounts
                .next_operation_seq_no(name)
                .await
                .ok_or_else(|| Error::consistency(format!("account '{}' disappeared from cache", name)))?;

            let row = AccountOperation { operation_id, account_id, operation_seq_no, block_number };
            match self.mode {
                IngestionMode::Live => {
                    self.storage.volatile.write().await.account_operations.insert(block_number, operation_id, row);
                }
                IngestionMode::Replay => {
                    self.replay_batch.lock().await.account_operations.push(row);
                }
            }
        }

        Ok(())
    }

    async fn discover_and_assign(&self, raw: &RawOperation, block_number: u32) -> Result<()> {
        for name in discovery::discover_new_accounts(raw, &self.storage.accounts).await {
            let id = self.storage.accounts.insert_new(&name).await;
            let account = Account { account_id: id, name: name.clone() };
            debug!(account_id = id, name = %name, "new account discovered");
            match self.mode {
                IngestionMode::Live => {
                    self.storage.volatile.write().await.accounts.insert(block_number, id, account);
                }
                IngestionMode::Replay => {
                    self.replay_batch.lock().await.accounts.push(account);
                }
            }
        }

        if let Some(text) = discovery::discover_new_permlink(raw, &self.storage.permlinks).await {
            let id = self.storage.permlinks.get_or_insert(&text).await;
            let permlink = Permlink { permlink_id: id, text: text.clone() };
            debug!(permlink_id = id, "new permlink discovered");
            match self.mode {
                IngestionMode::Live => {
                    self.storage.volatile.write().await.permlinks.insert(block_number, id, permlink);
                }
                IngestionMode::Replay => {
                    self.replay_batch.lock().await.permlinks.push(permlink);
                }
            }
        }

        Ok(())
    }

    /// §4.6 post-block hook: materialize the block/transaction rows, reset
    /// the per-block virtual-op counter, and flush on the configured
    /// cadence.
    pub async fn post_block(&self, block: Block, transactions: Vec<Transaction>, multisigs: Vec<MultiSig>) -> Result<()> {
        let block_number = block.block_number;

        match self.mode {
            IngestionMode::Live => {
                let mut volatile = self.storage.volatile.write().await;
                volatile.blocks.insert(block_number, block_number as i32, block);
                for tx in transactions {
                    let key = (tx.trx_in_block, self.multisig_seq.fetch_add(1, Ordering::SeqCst));
                    volatile.transactions.insert(block_number, key, tx);
                }
                for ms in multisigs {
                    let key = self.multisig_seq.fetch_add(1, Ordering::SeqCst);
                    volatile.multisigs.insert(block_number, key, ms);
                }
            }
            IngestionMode::Replay => {
                let mut batch = self.replay_batch.lock().await;
                batch.blocks.push(block);
                batch.transactions.extend(transactions);
                batch.multisigs.extend(multisigs);
            }
        }

        self.block_vops.store(0, Ordering::SeqCst);

        if self.blocks_per_commit == 0 || block_number % self.blocks_per_commit == 0 {
            self.flush().await;
        }

        Ok(())
    }

    /// Flush the replay-mode batch buffers to the writers. A no-op in live
    /// mode, where the buffers are never populated.
    pub async fn flush(&self) {
        let batch = std::mem::take(&mut *self.replay_batch.lock().await);
        if batch.accounts.is_empty()
            && batch.permlinks.is_empty()
            && batch.blocks.is_empty()
            && batch.transactions.is_empty()
            && batch.multisigs.is_empty()
            && batch.operations.is_empty()
            && batch.account_operations.is_empty()
        {
            return;
        }
        self.storage.writers.flush_batch(batch);
    }

    /// §4.8: drain the volatile store for a newly irreversible block and
    /// flush it to the writers. A no-op in replay mode, where rows never
    /// enter the volatile store in the first place.
    pub async fn on_irreversible(&self, gate: &PromotionGate, block_number: u32) {
        if matches!(self.mode, IngestionMode::Replay) {
            warn!(block_number, "on_irreversible called in replay mode, ignoring");
            return;
        }
        promoter::promote_block(&self.storage, gate, block_number).await;
    }
}
