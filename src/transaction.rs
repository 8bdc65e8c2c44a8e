use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, warn};

use crate::error::DbError;
use crate::executor::session::log_outcome;
use crate::pool::{ConnectionPool, PooledConnection};
use crate::statement::Statement;
use crate::udbc::row::{ExecStatus, Row};

/// An explicit transaction pinned to one pooled connection.
///
/// Finish it with [`commit`](Self::commit) or [`rollback`](Self::rollback).
/// Dropping it unfinished rolls back on a spawned task before the
/// connection goes back to the pool.
pub struct TransactionContext {
    conn: Option<PooledConnection>,
    pool: Arc<ConnectionPool>,
}

impl TransactionContext {
    pub async fn begin(pool: Arc<ConnectionPool>) -> Result<Self, DbError> {
        let mut conn = pool.borrow().await?;
        let begun = match conn.connection() {
            Ok(c) => c.begin().await.map_err(DbError::into_query),
            Err(e) => Err(e),
        };
        if let Err(e) = begun {
            error!(component = "execution", sql = "BEGIN", error = %e, "statement failed");
            return Err(e);
        }
        Ok(Self {
            conn: Some(conn),
            pool,
        })
    }

    fn conn(&mut self) -> Result<&mut PooledConnection, DbError> {
        self.conn.as_mut().ok_or(DbError::PoolClosed)
    }

    pub async fn query(&mut self, stmt: &Statement) -> Result<Vec<Row>, DbError> {
        let (sql, params) = stmt.render(self.pool.driver())?;
        let start = Instant::now();
        let result = self
            .conn()?
            .connection()?
            .query(&sql, &params)
            .await
            .map_err(DbError::into_query);
        log_outcome(&sql, start, &result);
        result.map(|r| r.into_rows())
    }

    pub async fn execute(&mut self, stmt: &Statement) -> Result<ExecStatus, DbError> {
        let (sql, params) = stmt.render(self.pool.driver())?;
        let start = Instant::now();
        let result = self
            .conn()?
            .connection()?
            .execute(&sql, &params)
            .await
            .map_err(DbError::into_query);
        log_outcome(&sql, start, &result);
        result
    }

    pub async fn commit(mut self) -> Result<(), DbError> {
        let mut conn = self.conn.take().ok_or(DbError::PoolClosed)?;
        conn.connection()?
            .commit()
            .await
            .map_err(|e| DbError::Commit(e.to_string()))
    }

    pub async fn rollback(mut self) -> Result<(), DbError> {
        let mut conn = self.conn.take().ok_or(DbError::PoolClosed)?;
        conn.connection()?.rollback().await
    }
}

impl Drop for TransactionContext {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Ok(c) = conn.connection() {
                        match c.rollback().await {
                            Ok(()) => debug!(component = "execution", "rolled back abandoned transaction"),
                            Err(e) => warn!(component = "execution", error = %e, "rollback of abandoned transaction failed"),
                        }
                    }
                });
            }
            // the pool discards connections still inside a transaction
            Err(_) => drop(conn),
        }
    }
}
