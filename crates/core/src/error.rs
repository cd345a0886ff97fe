use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// Writers recover locally from [`Error::SqlExec`] (the offending chunk is
/// discarded, the worker keeps running); readers surface an empty stream.
/// [`Error::Consistency`] and [`Error::SchemaMismatch`] indicate the on-disk
/// data can no longer be trusted and are treated as fatal by the ingestion
/// pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing required configuration, an unreachable database, or a failed
    /// schema-bootstrap statement. Raised during startup only.
    #[error("configuration error: {0}")]
    Config(String),

    /// A single INSERT/SELECT against the writer or reader pool failed.
    #[error("sql execution error: {0}")]
    SqlExec(String),

    /// An invariant the ingestion pipeline relies on was violated, e.g. an
    /// impacted account missing from the id-cache.
    #[error("consistency error: {0}")]
    Consistency(String),

    /// A stored function returned an unexpected column count or shape.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Generic error with a message, for call sites that don't fit the
    /// taxonomy above.
    #[error("{0}")]
    Generic(String),

    /// Any other error with its source, propagated transparently.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn sql_exec<S: Into<String>>(msg: S) -> Self {
        Error::SqlExec(msg.into())
    }

    pub fn consistency<S: Into<String>>(msg: S) -> Self {
        Error::Consistency(msg.into())
    }

    pub fn schema_mismatch<S: Into<String>>(msg: S) -> Self {
        Error::SchemaMismatch(msg.into())
    }

    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Error::Generic(msg.into())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Generic(s.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SchemaMismatch(format!("json error: {}", err))
    }
}

#[cfg(feature = "postgres")]
mod sqlx_impls {
    use super::Error;

    impl From<sqlx::Error> for Error {
        fn from(err: sqlx::Error) -> Self {
            Error::SqlExec(format!("database error: {}", err))
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Config(format!("i/o error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
