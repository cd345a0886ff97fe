//! Shared types, error taxonomy, configuration, and the connection pool
//! used across the ingestion pipeline and the query engine.

pub mod config;
pub mod error;
pub mod pool;
pub mod types;

pub use error::{Error, Result};
