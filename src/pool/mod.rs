//! Connection pooling
//!
//! A bounded pool of backing-store sessions with explicit checkout policy
//! and statistics.
//!
//! # Example
//!
//! ```ignore
//! use sqlpool::pool::{AcquirePolicy, ConnectionPool, PoolConfig};
//!
//! let config = PoolConfig::new(1, 10)?
//!     .with_acquire_timeout_ms(5000)
//!     .with_acquire_policy(AcquirePolicy::Wait);
//!
//! let pool = ConnectionPool::connect(config, driver).await?;
//! let mut conn = pool.borrow().await?;
//! conn.connection()?.query("SELECT 1", &[]).await?;
//! // Connection returned to pool on drop
//! ```

mod config;
#[allow(clippy::module_inception)]
mod pool;
mod stats;


pub use config::{AcquirePolicy, PoolConfig};
pub use pool::{ConnectionPool, PooledConnection};
pub use stats::PoolStats;
