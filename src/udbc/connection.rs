use crate::error::DbError;
use crate::udbc::row::{ExecStatus, ResultSet};
use crate::udbc::value::Value;
use async_trait::async_trait;

/// One live session to the backing store.
///
/// A connection is owned by exactly one borrower at a time, so every
/// operation takes `&mut self`. SQL handed to a connection is already
/// rendered for the driver's placeholder syntax.
#[async_trait]
pub trait Connection: Send {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, DbError>;

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecStatus, DbError>;

    // ---------- transaction ----------
    async fn begin(&mut self) -> Result<(), DbError>;
    async fn commit(&mut self) -> Result<(), DbError>;
    async fn rollback(&mut self) -> Result<(), DbError>;

    /// True between `begin` and a successful `commit`/`rollback`.
    fn in_transaction(&self) -> bool;

    // ---------- lifecycle ----------
    async fn ping(&mut self) -> Result<(), DbError>;
    async fn close(self: Box<Self>) -> Result<(), DbError>;

    /// Set once the session hit a transport-level failure; the pool never recycles it.
    fn is_broken(&self) -> bool;
}
