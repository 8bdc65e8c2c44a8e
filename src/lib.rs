//! Bounded, transactional SQL connection pool.
//!
//! [`PoolManager`] owns the process-wide pool, [`Session`] runs statements
//! against it and returns every borrowed connection on every path.

pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod pool;
pub mod pool_manager;
pub mod statement;
pub mod transaction;
pub mod udbc;
#[cfg(feature = "mysql")]
pub mod udbc_mysql;

pub use error::DbError;
pub use executor::session::Session;
pub use models::db_config::PoolOptions;
pub use pool::{AcquirePolicy, ConnectionPool, PoolConfig, PoolStats, PooledConnection};
pub use pool_manager::{DB, PoolManager, PoolScope, pool_mgr};
pub use statement::Statement;
pub use transaction::TransactionContext;
pub use udbc::{ExecStatus, Row, Table, TransactionSummary, Value};
