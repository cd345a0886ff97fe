//! Data processor (§4.2) and table writer (§4.3): one worker per SQL
//! connection, consuming a queue of chunks; one table writer per logical
//! table, formatting a typed row batch into a single multi-row `INSERT`.

use std::sync::Arc;

use sqlx::{Pool, Postgres};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// A unit of work handed to a [`DataProcessor`]: a closure producing the SQL
/// statement(s) to run inside one transaction. Returning an `Err` logs and
/// discards the chunk (§4.2) without stopping the worker.
pub type Chunk = Box<dyn FnOnce() -> String + Send + 'static>;

/// Owns one pooled connection's worker loop. `enqueue` is non-blocking
/// (backed by an unbounded channel); `join` waits for the queue to drain.
pub struct DataProcessor {
    sender: mpsc::UnboundedSender<Chunk>,
    handle: tokio::task::JoinHandle<()>,
}

impl DataProcessor {
    pub fn spawn(pool: Pool<Postgres>, name: &'static str) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Chunk>();
        let handle = tokio::spawn(async move {
            while let Some(chunk) = receiver.recv().await {
                let statement = chunk();
                if statement.trim().is_empty() {
                    continue;
                }
                if let Err(e) = apply_chunk(&pool, &statement).await {
                    error!(table = name, error = %e, "chunk discarded after sql error");
                    continue;
                }
                debug!(table = name, "chunk applied");
            }
        });
        Self { sender, handle }
    }

    /// Enqueue a chunk for asynchronous application. Never blocks; an
    /// unbounded FIFO is acceptable per §4.2.
    pub fn enqueue(&self, chunk: Chunk) {
        if self.sender.send(chunk).is_err() {
            warn!("data processor worker has already shut down, dropping chunk");
        }
    }

    /// Wait for every previously enqueued chunk to have been applied (or
    /// discarded), by closing the channel and awaiting worker drain.
    pub async fn join(self) {
        drop(self.sender);
        let _ = self.handle.await;
    }
}

async fn apply_chunk(pool: &Pool<Postgres>, statement: &str) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET CONSTRAINTS ALL DEFERRED").execute(&mut *tx).await?;
    sqlx::query(statement).execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(())
}

/// One instance per logical table (`accounts`, `permlinks`, `blocks`,
/// `transactions`, `multisigs`, `operations`, `account_operations`).
/// Formats a batch of typed rows into `INSERT INTO <table>(<cols>) VALUES
/// (...),(...);` and hands the statement to its [`DataProcessor`].
pub struct TableWriter<T> {
    processor: Arc<DataProcessor>,
    table: &'static str,
    columns: &'static [&'static str],
    format_row: fn(&T) -> String,
}

impl<T: Send + 'static> TableWriter<T> {
    pub fn new(
        processor: Arc<DataProcessor>,
        table: &'static str,
        columns: &'static [&'static str],
        format_row: fn(&T) -> String,
    ) -> Self {
        Self { processor, table, columns, format_row }
    }

    /// Build the INSERT statement for `rows` and enqueue it on the
    /// underlying data processor. A caller with an empty batch should skip
    /// calling this — an empty batch would otherwise enqueue a no-op chunk.
    pub fn flush(&self, rows: Vec<T>) {
        if rows.is_empty() {
            return;
        }
        let table = self.table;
        let columns = self.columns;
        let format_row = self.format_row;
        self.processor.enqueue(Box::new(move || build_insert(table, columns, &rows, format_row)));
    }
}

fn build_insert<T>(table: &str, columns: &[&str], rows: &[T], format_row: fn(&T) -> String) -> String {
    let mut sql = String::with_capacity(64 + rows.len() * 32);
    sql.push_str("INSERT INTO ");
    sql.push_str(table);
    sql.push('(');
    sql.push_str(&columns.join(","));
    sql.push_str(") VALUES ");

    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            sql.push(',');
        }
        sql.push('(');
        sql.push_str(&format_row(row));
        sql.push(')');
    }
    sql.push(';');
    sql
}
