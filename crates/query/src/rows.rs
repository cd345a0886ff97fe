//! Row shapes returned by the query engine, mirroring the stored function
//! signatures named in §6.

use indexer_core::types::{Operation, OperationBody};

/// One row of `ah_get_ops_in_block`/`ah_get_account_history`/
/// `ah_get_enum_virtual_ops` (the shared 7/8-field operation shape).
#[derive(Debug, Clone, PartialEq)]
pub struct OpRow {
    pub trx_id: String,
    pub trx_in_block: i32,
    pub op_in_trx: i32,
    pub is_virtual: bool,
    pub timestamp: String,
    pub body: String,
    pub operation_id: i64,
    pub block_number: u32,
}

impl OpRow {
    /// Build the reversible-path row from a volatile-store [`Operation`].
    /// `trx_id` and `timestamp` are not tracked by the volatile operation
    /// row itself; callers join them in from the block/transaction indices
    /// when available, otherwise they're left empty.
    pub fn from_operation(op: &Operation, trx_id: String, timestamp: String) -> Self {
        let body = match &op.body {
            OperationBody::Json(s) => s.clone(),
            OperationBody::Packed(bytes) => format!("\\x{}", hex::encode(bytes)),
        };
        Self {
            trx_id,
            trx_in_block: op.trx_in_block as i32,
            op_in_trx: op.op_in_trx as i32,
            is_virtual: op.is_virtual,
            timestamp,
            body,
            operation_id: op.operation_id,
            block_number: op.block_number,
        }
    }
}

/// Result of `get_transaction` (§4.10 op 2).
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDetail {
    pub ref_block_num: i32,
    pub ref_block_prefix: i64,
    pub expiration: String,
    pub block_num: i64,
    pub transaction_num: i32,
    pub signature: Option<String>,
    pub multisig_signatures: Vec<String>,
    pub operations: Vec<String>,
}

/// Paging cursor returned by `enum_virtual_ops` (§4.10 op 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnumCursor {
    pub next_block: u32,
    pub next_operation_id: i64,
}
