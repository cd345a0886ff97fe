//! The volatile store (§4.4): in-memory, per-entity ordered indices of
//! not-yet-irreversible rows, keyed primarily by block number so that the
//! irreversibility promoter can range-scan and drain a single block in one
//! pass.

use std::collections::BTreeMap;

use indexer_core::types::{Account, AccountOperation, Block, MultiSig, Operation, Permlink, Transaction};

/// A totally-ordered key type usable as the secondary component of a
/// [`BlockKeyedIndex`], with sentinel min/max values so a block-number
/// prefix can be expressed as an inclusive range.
pub trait IndexKey: Ord + Copy {
    fn min_key() -> Self;
    fn max_key() -> Self;
}

impl IndexKey for i32 {
    fn min_key() -> Self {
        i32::MIN
    }
    fn max_key() -> Self {
        i32::MAX
    }
}

impl IndexKey for i64 {
    fn min_key() -> Self {
        i64::MIN
    }
    fn max_key() -> Self {
        i64::MAX
    }
}

impl IndexKey for (u16, i32) {
    fn min_key() -> Self {
        (u16::MIN, i32::MIN)
    }
    fn max_key() -> Self {
        (u16::MAX, i32::MAX)
    }
}

/// A block-number-prefixed ordered index over rows of type `T`, keyed by
/// `(block_number, secondary)`. Supports insertion, point removal, and
/// range-scan over a block-number prefix in ascending secondary-key order —
/// exactly the operations §4.4 and the promoter (§4.8) require.
#[derive(Debug)]
pub struct BlockKeyedIndex<K: IndexKey, T> {
    rows: BTreeMap<(u32, K), T>,
}

impl<K: IndexKey, T> Default for BlockKeyedIndex<K, T> {
    fn default() -> Self {
        Self { rows: BTreeMap::new() }
    }
}

impl<K: IndexKey, T> BlockKeyedIndex<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, block_number: u32, key: K, row: T) {
        self.rows.insert((block_number, key), row);
    }

    pub fn remove(&mut self, block_number: u32, key: K) -> Option<T> {
        self.rows.remove(&(block_number, key))
    }

    pub fn contains_block(&self, block_number: u32) -> bool {
        self.rows.range((block_number, K::min_key())..=(block_number, K::max_key())).next().is_some()
    }

    /// Remove every row with `block_number == N` and return them in
    /// ascending secondary-key order. This is the promoter's drain step.
    pub fn drain_block(&mut self, block_number: u32) -> Vec<T> {
        let keys: Vec<(u32, K)> = self
            .rows
            .range((block_number, K::min_key())..=(block_number, K::max_key()))
            .map(|(k, _)| *k)
            .collect();
        keys.into_iter().filter_map(|k| self.rows.remove(&k)).collect()
    }

    /// Scan rows with `block_number` in `[begin, end)` in ascending
    /// `(block_number, secondary)` order, without removing them.
    pub fn scan_range(&self, begin: u32, end: u32) -> impl Iterator<Item = &T> {
        self.rows.range((begin, K::min_key())..(end, K::min_key())).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Every entity's volatile holding area, keyed the way §4.4 specifies.
pub struct VolatileStore {
    pub accounts: BlockKeyedIndex<i32, Account>,
    pub permlinks: BlockKeyedIndex<i32, Permlink>,
    pub blocks: BlockKeyedIndex<i32, Block>,
    pub transactions: BlockKeyedIndex<(u16, i32), Transaction>,
    pub multisigs: BlockKeyedIndex<i32, MultiSig>,
    pub operations: BlockKeyedIndex<i64, Operation>,
    pub account_operations: BlockKeyedIndex<i64, AccountOperation>,
}

impl Default for VolatileStore {
    fn default() -> Self {
        Self {
            accounts: BlockKeyedIndex::new(),
            permlinks: BlockKeyedIndex::new(),
            blocks: BlockKeyedIndex::new(),
            transactions: BlockKeyedIndex::new(),
            multisigs: BlockKeyedIndex::new(),
            operations: BlockKeyedIndex::new(),
            account_operations: BlockKeyedIndex::new(),
        }
    }
}

impl VolatileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_block(&self, block_number: u32) -> bool {
        self.blocks.contains_block(block_number)
    }

    /// Operations observed for `block_number`, in `(trx_in_block, id)`
    /// insertion order — the order §4.10's `get_ops_in_block` must emit
    /// reversible rows in. `operations` is keyed by operation id alone, so
    /// we additionally sort by `(trx_in_block, op_in_trx)` here.
    pub fn operations_in_block(&self, block_number: u32) -> Vec<&Operation> {
        let mut ops: Vec<&Operation> = self.operations.scan_range(block_number, block_number + 1).collect();
        ops.sort_by_key(|op| (op.trx_in_block, op.op_in_trx));
        ops
    }

    /// Drain every row with `block_number == N`, in the fixed table order
    /// the spec mandates for the promoter.
    pub fn drain_for_promotion(&mut self, block_number: u32) -> PromotionBatch {
        PromotionBatch {
            accounts: self.accounts.drain_block(block_number),
            permlinks: self.permlinks.drain_block(block_number),
            blocks: self.blocks.drain_block(block_number),
            transactions: self.transactions.drain_block(block_number),
            multisigs: self.multisigs.drain_block(block_number),
            operations: self.operations.drain_block(block_number),
            account_operations: self.account_operations.drain_block(block_number),
        }
    }
}

/// A batch of drained rows for one block, produced by [`VolatileStore`]'s
/// promoter drain and consumed by the per-table writers (§4.8 fixed table
/// order: accounts, permlinks, blocks, transactions, multisigs, operations,
/// account_operations).
#[derive(Default)]
pub struct PromotionBatch {
    pub accounts: Vec<Account>,
    pub permlinks: Vec<Permlink>,
    pub blocks: Vec<Block>,
    pub transactions: Vec<Transaction>,
    pub multisigs: Vec<MultiSig>,
    pub operations: Vec<Operation>,
    pub account_operations: Vec<AccountOperation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn account(id: i32, name: &str) -> Account {
        Account { account_id: id, name: name.to_string() }
    }

    #[test]
    fn insert_and_contains_block() {
        let mut idx: BlockKeyedIndex<i32, Account> = BlockKeyedIndex::new();
        idx.insert(5, 1, account(1, "alice"));
        assert!(idx.contains_block(5));
        assert!(!idx.contains_block(6));
    }

    #[test]
    fn drain_block_removes_only_that_block() {
        let mut idx: BlockKeyedIndex<i32, Account> = BlockKeyedIndex::new();
        idx.insert(5, 1, account(1, "alice"));
        idx.insert(5, 2, account(2, "bob"));
        idx.insert(6, 3, account(3, "carol"));

        let drained = idx.drain_block(5);
        assert_eq!(drained.len(), 2);
        assert!(!idx.contains_block(5));
        assert!(idx.contains_block(6));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn scan_range_is_block_number_prefix() {
        let mut idx: BlockKeyedIndex<i32, Account> = BlockKeyedIndex::new();
        idx.insert(1, 1, account(1, "a"));
        idx.insert(2, 2, account(2, "b"));
        idx.insert(3, 3, account(3, "c"));

        let scanned: Vec<&str> = idx.scan_range(1, 3).map(|a| a.name.as_str()).collect();
        assert_eq!(scanned, vec!["a", "b"]);
    }

    #[test]
    fn operations_in_block_orders_by_trx_then_op_in_trx() {
        let mut store = VolatileStore::new();
        let body = indexer_core::types::OperationBody::Packed(vec![]);
        store.operations.insert(
            10,
            2,
            Operation { operation_id: 2, block_number: 10, trx_in_block: 1, op_in_trx: 0, op_type_id: 1, is_virtual: false, body: body.clone() },
        );
        store.operations.insert(
            10,
            1,
            Operation { operation_id: 1, block_number: 10, trx_in_block: 0, op_in_trx: 0, op_type_id: 1, is_virtual: false, body },
        );

        let ops = store.operations_in_block(10);
        assert_eq!(ops.iter().map(|o| o.operation_id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn drain_for_promotion_empties_volatile_store_for_that_block() {
        let mut store = VolatileStore::new();
        store.blocks.insert(
            7,
            7,
            Block { block_number: 7, hash: [0u8; 20], prev_hash: [0u8; 20], created_at: Utc::now() },
        );
        assert!(store.contains_block(7));

        let batch = store.drain_for_promotion(7);
        assert_eq!(batch.blocks.len(), 1);
        assert!(!store.contains_block(7));
    }
}
