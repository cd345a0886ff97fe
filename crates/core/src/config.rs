//! Typed configuration for the indexer process.
//!
//! Options are loaded from CLI flags with environment-variable fallback, per
//! the reference stack's `clap::Parser` convention. Validation happens once,
//! at startup, in [`Config::validate`].

use clap::Parser;

use crate::error::{Error, Result};

/// Block-gap threshold controlling index/foreign-key drop-and-recreate
/// around a bulk load. See [`Config::should_cycle_indexes`].
pub const DEFAULT_PSQL_INDEX_THRESHOLD: u64 = 1_000_000;

#[derive(Debug, Clone, Parser)]
#[command(name = "chain-history-indexer")]
pub struct Config {
    /// SQL connection string for the indexer's writer path.
    #[arg(long, env = "PSQL_URL")]
    pub psql_url: Option<String>,

    /// Optional file executed line-by-line to bootstrap schema when starting
    /// from block 0.
    #[arg(long, env = "PSQL_PATH_TO_SCHEMA")]
    pub psql_path_to_schema: Option<String>,

    /// Block-gap threshold controlling index/foreign-key drop/recreate
    /// around a bulk load.
    #[arg(long, env = "PSQL_INDEX_THRESHOLD", default_value_t = DEFAULT_PSQL_INDEX_THRESHOLD)]
    pub psql_index_threshold: u64,

    /// SQL connection string for the read-only query engine.
    #[arg(long, env = "AHSQL_URL")]
    pub ahsql_url: Option<String>,

    /// Size of the read-side connection pool.
    #[arg(long, env = "WEBSERVER_THREAD_POOL_SIZE", default_value_t = 16)]
    pub webserver_thread_pool_size: usize,

    /// Genesis/built-in account names (e.g. `initminer,null,temp`) the node's
    /// state index already knows about before any block has been ingested.
    /// Inserted once into `hive_accounts` at recovery if still absent (§4.5).
    #[arg(long, env = "BUILTIN_ACCOUNTS", value_delimiter = ',')]
    pub builtin_accounts: Vec<String>,
}

impl Config {
    /// Validate required fields are present. Called once at startup; a
    /// failure here is a [`Error::Config`] and aborts the process.
    pub fn validate(&self) -> Result<()> {
        if self.psql_url.as_deref().unwrap_or("").is_empty() {
            return Err(Error::config("psql-url is required"));
        }
        if self.ahsql_url.as_deref().unwrap_or("").is_empty() {
            return Err(Error::config("ahsql-url is required"));
        }
        if self.webserver_thread_pool_size == 0 {
            return Err(Error::config("webserver-thread-pool-size must be > 0"));
        }
        Ok(())
    }

    pub fn psql_url(&self) -> Result<&str> {
        self.psql_url
            .as_deref()
            .ok_or_else(|| Error::config("psql-url is required"))
    }

    pub fn ahsql_url(&self) -> Result<&str> {
        self.ahsql_url
            .as_deref()
            .ok_or_else(|| Error::config("ahsql-url is required"))
    }

    /// Index/FK drop-and-recreate policy (§4.9): drop before bulk load and
    /// recreate after when starting from genesis, or when the gap to the
    /// chain tip is still within the configured threshold.
    pub fn should_cycle_indexes(&self, psql_block_number: u64, head_block_number: u64) -> bool {
        psql_block_number == 0 || psql_block_number + self.psql_index_threshold <= head_block_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            psql_url: Some("postgres://localhost/writer".into()),
            psql_path_to_schema: None,
            psql_index_threshold: DEFAULT_PSQL_INDEX_THRESHOLD,
            ahsql_url: Some("postgres://localhost/reader".into()),
            webserver_thread_pool_size: 16,
            builtin_accounts: Vec::new(),
        }
    }

    #[test]
    fn validate_requires_psql_url() {
        let mut cfg = base_config();
        cfg.psql_url = None;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_requires_ahsql_url() {
        let mut cfg = base_config();
        cfg.ahsql_url = None;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_passes_with_required_fields() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn index_threshold_zero_always_cycles() {
        let mut cfg = base_config();
        cfg.psql_index_threshold = 0;
        assert!(cfg.should_cycle_indexes(500, 500));
        assert!(cfg.should_cycle_indexes(0, 0));
    }

    #[test]
    fn genesis_always_cycles() {
        let cfg = base_config();
        assert!(cfg.should_cycle_indexes(0, 10_000_000));
    }

    #[test]
    fn within_threshold_cycles_outside_does_not() {
        let cfg = base_config();
        assert!(cfg.should_cycle_indexes(1, 1 + DEFAULT_PSQL_INDEX_THRESHOLD));
        assert!(!cfg.should_cycle_indexes(1, 1 + DEFAULT_PSQL_INDEX_THRESHOLD + 1));
    }
}
