//! Schema bootstrap and index/foreign-key cycling (§4.9).
//!
//! Bootstrap executes `psql-path-to-schema` line by line against a fresh
//! database (recovered `psql_block_number == 0`). Index cycling wraps the
//! four server-side DDL helper functions named in §6: drop order is
//! foreign-keys then indexes/constraints; recreate is the inverse order.

use sqlx::{Pool, Postgres};
use tracing::info;

use indexer_core::error::Result;
use indexer_core::types::OperationKind;

/// The seven persisted tables index/FK cycling applies to, in the order
/// used for bootstrap logging; cycling itself runs per-table.
pub const CYCLED_TABLES: &[&str] = &[
    "hive_accounts",
    "hive_permlink_data",
    "hive_blocks",
    "hive_transactions",
    "hive_transactions_multisig",
    "hive_operations",
    "hive_account_operations",
];

/// Execute `schema_sql` one line at a time against `pool`. Blank lines are
/// skipped. Matches the original ingestion tool's one-statement-per-line
/// convention for its bootstrap script.
pub async fn bootstrap_schema(pool: &Pool<Postgres>, schema_sql: &str) -> Result<()> {
    for line in schema_sql.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        sqlx::query(line).execute(pool).await?;
    }
    info!("schema bootstrap complete");
    Ok(())
}

/// Drop foreign keys then indexes/constraints for every cycled table, ahead
/// of a bulk load.
pub async fn drop_indexes_and_constraints(pool: &Pool<Postgres>) -> Result<()> {
    for table in CYCLED_TABLES {
        sqlx::query("SELECT save_and_drop_indexes_foreign_keys($1)").bind(*table).execute(pool).await?;
    }
    for table in CYCLED_TABLES {
        sqlx::query("SELECT save_and_drop_indexes_constraints($1)").bind(*table).execute(pool).await?;
    }
    info!(tables = CYCLED_TABLES.len(), "dropped indexes and foreign keys ahead of bulk load");
    Ok(())
}

/// Recreate indexes/constraints then foreign keys — the inverse of
/// [`drop_indexes_and_constraints`].
pub async fn restore_indexes_and_constraints(pool: &Pool<Postgres>) -> Result<()> {
    for table in CYCLED_TABLES {
        sqlx::query("SELECT restore_indexes_constraints($1)").bind(*table).execute(pool).await?;
    }
    for table in CYCLED_TABLES {
        sqlx::query("SELECT restore_foreign_keys($1)").bind(*table).execute(pool).await?;
    }
    info!(tables = CYCLED_TABLES.len(), "restored indexes and foreign keys after bulk load");
    Ok(())
}

/// Populate `hive_operation_types` from the build-time-known
/// [`OperationKind::ALL`] enumeration. Idempotent: safe to run on every
/// startup, not only at genesis.
pub async fn populate_operation_types(pool: &Pool<Postgres>) -> Result<()> {
    for kind in OperationKind::ALL {
        sqlx::query("INSERT INTO hive_operation_types(id, name, is_virtual) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING")
            .bind(kind.id() as i32)
            .bind(kind.name())
            .bind(kind.is_virtual())
            .execute(pool)
            .await?;
    }
    info!(count = OperationKind::ALL.len(), "populated hive_operation_types");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycled_tables_matches_promotion_order() {
        assert_eq!(
            CYCLED_TABLES,
            &[
                "hive_accounts",
                "hive_permlink_data",
                "hive_blocks",
                "hive_transactions",
                "hive_transactions_multisig",
                "hive_operations",
                "hive_account_operations",
            ]
        );
    }
}
