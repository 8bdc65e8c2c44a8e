use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, warn};

use crate::error::DbError;
use crate::pool::{ConnectionPool, PoolStats, PooledConnection};
use crate::statement::Statement;
use crate::transaction::TransactionContext;
use crate::udbc::row::{ExecStatus, ResultSet, Row, Table, TransactionSummary};
use crate::udbc::value::Value;

/// Execution entry point over a connection pool.
///
/// Every call renders its statement first, borrows exactly one connection
/// and hands it back on every exit path. Bound values are never logged.
#[derive(Clone)]
pub struct Session {
    pool: Arc<ConnectionPool>,
}

impl Session {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// First row of the result, if any.
    pub async fn fetch_one(&self, stmt: &Statement) -> Result<Option<Row>, DbError> {
        self.read(stmt).await.map(ResultSet::into_first_row)
    }

    pub async fn fetch_all(&self, stmt: &Statement) -> Result<Vec<Row>, DbError> {
        self.read(stmt).await.map(ResultSet::into_rows)
    }

    /// Column names plus row values. Failures are reported in
    /// [`Table::error`] rather than returned.
    pub async fn fetch_tabular(&self, sql: &str) -> Table {
        match self.read(&Statement::ad_hoc(sql)).await {
            Ok(result) => Table::from(result),
            Err(e) => Table::failed(e.to_string()),
        }
    }

    /// Runs one write in its own transaction.
    pub async fn execute(&self, stmt: &Statement) -> Result<ExecStatus, DbError> {
        let (sql, params) = stmt.render(self.pool.driver())?;
        let start = Instant::now();
        let mut conn = self.pool.borrow().await?;

        let result = match Self::write(&mut conn, &sql, &params).await {
            Ok(status) => match conn.connection()?.commit().await {
                Ok(()) => Ok(status),
                Err(e) => Err(DbError::Commit(e.to_string())),
            },
            Err(e) => {
                Self::rollback(&mut conn).await;
                Err(e)
            }
        };
        log_outcome(&sql, start, &result);
        result
    }

    /// Runs `statements` on one connection, all or nothing.
    ///
    /// A failure at position `k` rolls everything back and is reported as
    /// [`DbError::Transaction`] with `index == k`. An empty batch succeeds
    /// without touching the pool.
    pub async fn execute_transaction(
        &self,
        statements: &[Statement],
    ) -> Result<TransactionSummary, DbError> {
        if statements.is_empty() {
            return Ok(TransactionSummary::default());
        }

        let driver = self.pool.driver();
        let rendered = statements
            .iter()
            .enumerate()
            .map(|(index, stmt)| {
                stmt.render(driver).map_err(|e| DbError::Transaction {
                    index,
                    source: Box::new(e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let start = Instant::now();
        let mut conn = self.pool.borrow().await?;
        let begun = match conn.connection() {
            Ok(c) => c.begin().await.map_err(DbError::into_query),
            Err(e) => Err(e),
        };
        if let Err(e) = begun {
            error!(component = "execution", sql = "BEGIN", error = %e, "statement failed");
            Self::rollback(&mut conn).await;
            return Err(e);
        }

        let mut summary = TransactionSummary::default();
        for (index, (sql, params)) in rendered.iter().enumerate() {
            let result = conn
                .connection()?
                .execute(sql, params)
                .await
                .map_err(DbError::into_query);
            log_outcome(sql, start, &result);
            match result {
                Ok(status) => {
                    summary.statements += 1;
                    summary.rows_affected += status.rows_affected;
                }
                Err(e) => {
                    Self::rollback(&mut conn).await;
                    return Err(DbError::Transaction {
                        index,
                        source: Box::new(e),
                    });
                }
            }
        }

        conn.connection()?.commit().await.map_err(|e| {
            error!(component = "execution", error = %e, "commit failed");
            DbError::Commit(e.to_string())
        })?;
        debug!(
            component = "execution",
            statements = summary.statements,
            rows_affected = summary.rows_affected,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "transaction committed"
        );
        Ok(summary)
    }

    /// Starts an explicit transaction on a dedicated connection.
    pub async fn begin(&self) -> Result<TransactionContext, DbError> {
        TransactionContext::begin(self.pool.clone()).await
    }

    async fn read(&self, stmt: &Statement) -> Result<ResultSet, DbError> {
        let (sql, params) = stmt.render(self.pool.driver())?;
        let start = Instant::now();
        let mut conn = self.pool.borrow().await?;

        let result = match conn.connection() {
            Ok(c) => c.query(&sql, &params).await.map_err(DbError::into_query),
            Err(e) => Err(e),
        };
        // a read must not leave transaction state behind
        if conn.in_transaction() {
            Self::rollback(&mut conn).await;
        }
        log_outcome(&sql, start, &result);
        result
    }

    async fn write(
        conn: &mut PooledConnection,
        sql: &str,
        params: &[Value],
    ) -> Result<ExecStatus, DbError> {
        let c = conn.connection()?;
        c.begin().await.map_err(DbError::into_query)?;
        c.execute(sql, params).await.map_err(DbError::into_query)
    }

    async fn rollback(conn: &mut PooledConnection) {
        let Ok(c) = conn.connection() else {
            return;
        };
        match c.rollback().await {
            Ok(()) => debug!(component = "execution", "transaction rolled back"),
            // the pool discards connections still inside a transaction
            Err(e) => warn!(component = "execution", error = %e, "rollback failed"),
        }
    }
}

pub(crate) fn log_outcome<T>(sql: &str, start: Instant, result: &Result<T, DbError>) {
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(_) => debug!(component = "execution", sql, elapsed_ms, "statement executed"),
        Err(e) => error!(component = "execution", sql, error = %e, elapsed_ms, "statement failed"),
    }
}
