//! Domain entities materialized by the ingestion pipeline and read back by
//! the query engine. These mirror the persisted `hive_*` table shapes
//! (see `indexer_storage::postgres::schema`) but are not tied to SQL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SHA1-sized digest used for block and transaction identifiers.
pub type Digest = [u8; 20];

/// A single ECDSA signature as stored by the node (65 raw bytes).
pub type Signature = [u8; 65];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub block_number: u32,
    pub hash: Digest,
    pub prev_hash: Digest,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub block_number: u32,
    pub trx_in_block: u16,
    pub hash: Digest,
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    pub expiration: DateTime<Utc>,
    #[serde(with = "opt_signature")]
    pub primary_signature: Option<Signature>,
}

/// (De)serialization for `Option<Signature>`: serde only derives arrays up to
/// 32 elements natively, so the 65-byte signature needs `serde_big_array`,
/// which in turn only covers the bare array, not an `Option` around it.
mod opt_signature {
    use super::Signature;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_big_array::BigArray;

    #[derive(Serialize, Deserialize)]
    struct Wrapper(#[serde(with = "BigArray")] Signature);

    pub fn serialize<S: Serializer>(value: &Option<Signature>, ser: S) -> Result<S::Ok, S::Error> {
        value.map(Wrapper).serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Signature>, D::Error> {
        Ok(Option::<Wrapper>::deserialize(de)?.map(|w| w.0))
    }
}

/// A signature beyond the transaction's primary one (multi-sig transactions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSig {
    pub transaction_hash: Digest,
    #[serde(with = "serde_big_array::BigArray")]
    pub signature: Signature,
}

/// The wire body of an operation. Replay/live ingestion carries the packed
/// binary form; it is rendered to JSON text only at flush time so that the
/// replay/live equivalence property (same bytes in, same SQL row out) holds
/// regardless of which path produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationBody {
    Packed(Vec<u8>),
    Json(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub operation_id: i64,
    pub block_number: u32,
    pub trx_in_block: i16,
    pub op_in_trx: i16,
    pub op_type_id: u16,
    pub is_virtual: bool,
    pub body: OperationBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: i32,
    pub name: String,
}

impl Account {
    pub const MAX_NAME_LEN: usize = 16;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permlink {
    pub permlink_id: i32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOperation {
    pub operation_id: i64,
    pub account_id: i32,
    pub operation_seq_no: i32,
    /// block_number is carried for volatile-store keying; it is not a
    /// persisted column.
    pub block_number: u32,
}

/// The finite, build-time-known set of operation kinds. `id()`/`is_virtual()`
/// populate `hive_operation_types` once at bootstrap and drive new-id
/// discovery (see `indexer_pipeline::discovery`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    AccountCreate,
    AccountCreateWithDelegation,
    CreateClaimedAccount,
    Comment,
    Pow,
    Pow2,
    ProducerReward,
    Other(u16),
}

impl OperationKind {
    pub fn id(&self) -> u16 {
        match self {
            OperationKind::AccountCreate => 9,
            OperationKind::AccountCreateWithDelegation => 41,
            OperationKind::CreateClaimedAccount => 51,
            OperationKind::Comment => 1,
            OperationKind::Pow => 14,
            OperationKind::Pow2 => 30,
            OperationKind::ProducerReward => 52,
            OperationKind::Other(id) => *id,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, OperationKind::ProducerReward)
    }

    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::AccountCreate => "account_create",
            OperationKind::AccountCreateWithDelegation => "account_create_with_delegation",
            OperationKind::CreateClaimedAccount => "create_claimed_account",
            OperationKind::Comment => "comment",
            OperationKind::Pow => "pow",
            OperationKind::Pow2 => "pow2",
            OperationKind::ProducerReward => "producer_reward",
            OperationKind::Other(_) => "other",
        }
    }

    /// The finite enumeration populated into `hive_operation_types` at
    /// bootstrap.
    pub const ALL: &'static [OperationKind] = &[
        OperationKind::AccountCreate,
        OperationKind::AccountCreateWithDelegation,
        OperationKind::CreateClaimedAccount,
        OperationKind::Comment,
        OperationKind::Pow,
        OperationKind::Pow2,
        OperationKind::ProducerReward,
    ];
}

/// A raw, not-yet-assigned-ids node notification for a non-virtual operation.
/// The pipeline's new-id-discovery step (`indexer_pipeline::discovery`)
/// inspects `kind` and `accounts_impacted`/`permlink_text` to learn about
/// accounts and permlinks before assigning an `operation_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOperation {
    pub kind: OperationKind,
    pub trx_in_block: i16,
    pub op_in_trx: i16,
    pub accounts_impacted: Vec<String>,
    pub new_account_name: Option<String>,
    pub permlink_text: Option<String>,
    pub body: OperationBody,
}

/// Whether the ingestion pipeline is running against the chain tip (volatile
/// store, `blocks_per_commit = 1`) or bulk-replaying history (direct batch
/// population, larger `blocks_per_commit`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestionMode {
    Live,
    Replay,
}

impl IngestionMode {
    pub fn default_blocks_per_commit(self) -> u32 {
        match self {
            IngestionMode::Live => 1,
            IngestionMode::Replay => 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_kind_ids_are_distinct() {
        let mut ids: Vec<u16> = OperationKind::ALL.iter().map(|k| k.id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), OperationKind::ALL.len());
    }

    #[test]
    fn only_producer_reward_is_virtual() {
        for kind in OperationKind::ALL {
            assert_eq!(kind.is_virtual(), matches!(kind, OperationKind::ProducerReward));
        }
    }

    #[test]
    fn other_kind_carries_its_own_id() {
        assert_eq!(OperationKind::Other(200).id(), 200);
        assert!(!OperationKind::Other(200).is_virtual());
    }

    #[test]
    fn replay_mode_commits_less_often_than_live() {
        assert!(IngestionMode::Replay.default_blocks_per_commit() > IngestionMode::Live.default_blocks_per_commit());
    }
}
