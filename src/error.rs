use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the pool, the lifecycle guard and the execution facade.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Pool exhausted: all {0} connections are borrowed")]
    PoolExhausted(usize),
    #[error("Timed out waiting for a pooled connection after {0:?}")]
    PoolTimeout(Duration),
    #[error("Pool is closed")]
    PoolClosed,
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Transaction failed at statement {index}: {source}")]
    Transaction {
        index: usize,
        #[source]
        source: Box<DbError>,
    },
    #[error("Commit failed: {0}")]
    Commit(String),
    #[error("Value error: {0}")]
    Value(String),
}

impl DbError {
    /// Index of the failing statement for a batch failure.
    pub fn failed_index(&self) -> Option<usize> {
        match self {
            DbError::Transaction { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Folds a transport failure during statement execution into `Query`.
    pub(crate) fn into_query(self) -> DbError {
        match self {
            DbError::Connection(msg) => DbError::Query(format!("connection lost: {}", msg)),
            other => other,
        }
    }

    /// Whether a caller may reasonably retry after backing off.
    pub fn is_pool_saturation(&self) -> bool {
        matches!(self, DbError::PoolExhausted(_) | DbError::PoolTimeout(_))
    }
}

impl serde::ser::Error for DbError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        DbError::Value(msg.to_string())
    }
}

impl From<figment::Error> for DbError {
    fn from(e: figment::Error) -> Self {
        DbError::Configuration(e.to_string())
    }
}

#[cfg(feature = "mysql")]
impl From<mysql_async::Error> for DbError {
    fn from(e: mysql_async::Error) -> Self {
        match e {
            mysql_async::Error::Server(_) => DbError::Query(e.to_string()),
            mysql_async::Error::Url(_) => DbError::Configuration(e.to_string()),
            _ => DbError::Connection(e.to_string()),
        }
    }
}
