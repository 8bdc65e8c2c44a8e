//! In-memory transactional store used by the integration tests.
//!
//! One table of items. Recognised statements:
//! - `INSERT ...` with one bound value appends it
//! - `DELETE ...` removes rows equal to the bound value, or all rows
//! - `SELECT ...` returns column `item`, filtered by the bound value if any
//! - `SELECT SLEEP` holds the connection for a while
//! - `SELECT ... FOR UPDATE` opens a transaction and leaves it open
//! - anything containing `INVALID` fails like a syntax error

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use sqlpool::udbc::connection::Connection;
use sqlpool::udbc::driver::Driver;
use sqlpool::udbc::row::{ExecStatus, ResultSet};
use sqlpool::{ConnectionPool, DbError, PoolConfig, PoolOptions, Session, Value};

pub const SLEEP: Duration = Duration::from_millis(100);

#[derive(Default)]
pub struct Store {
    items: Mutex<Vec<Value>>,
    pub unreachable: AtomicBool,
    pub fail_commit: AtomicBool,
    opened: AtomicUsize,
    closed: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl Store {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn items(&self) -> Vec<Value> {
        self.items.lock().clone()
    }

    pub fn seed(&self, values: impl IntoIterator<Item = Value>) {
        self.items.lock().extend(values);
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }
}

pub struct MemoryConnection {
    store: Arc<Store>,
    /// Working copy while a transaction is open.
    staged: Option<Vec<Value>>,
    broken: bool,
}

impl MemoryConnection {
    fn check(&mut self, sql: &str) -> Result<(), DbError> {
        if self.store.unreachable.load(Ordering::SeqCst) {
            self.broken = true;
            return Err(DbError::Connection("connection reset by peer".into()));
        }
        if sql.to_uppercase().contains("INVALID") {
            return Err(DbError::Query(format!("syntax error near `{}`", sql)));
        }
        Ok(())
    }

    fn with_items<R>(&mut self, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        match self.staged.as_mut() {
            Some(staged) => f(staged),
            None => f(&mut *self.store.items.lock()),
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, DbError> {
        self.check(sql)?;
        let upper = sql.to_uppercase();
        if upper.starts_with("SELECT SLEEP") {
            tokio::time::sleep(SLEEP).await;
            return Ok(ResultSet::new(vec!["slept".into()], vec![vec![Value::I64(1)]]));
        }
        if !upper.starts_with("SELECT") {
            return Ok(ResultSet::default());
        }
        if upper.ends_with("FOR UPDATE") && self.staged.is_none() {
            self.staged = Some(self.store.items());
        }
        let filter = params.first().cloned();
        let rows: Vec<Vec<Value>> = self.with_items(|items| {
            items
                .iter()
                .filter(|v| filter.as_ref().is_none_or(|f| f == *v))
                .map(|v| vec![v.clone()])
                .collect()
        });
        Ok(ResultSet::new(vec!["item".into()], rows))
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecStatus, DbError> {
        self.check(sql)?;
        let upper = sql.to_uppercase();
        if upper.starts_with("INSERT") {
            let value = params.first().cloned().unwrap_or(Value::Null);
            let id = self.with_items(|items| {
                items.push(value);
                items.len() as u64
            });
            return Ok(ExecStatus {
                rows_affected: 1,
                last_insert_id: Some(id),
            });
        }
        if upper.starts_with("DELETE") {
            let filter = params.first().cloned();
            let removed = self.with_items(|items| {
                let before = items.len();
                items.retain(|v| filter.as_ref().is_some_and(|f| f != v));
                before - items.len()
            });
            return Ok(ExecStatus {
                rows_affected: removed as u64,
                last_insert_id: None,
            });
        }
        Ok(ExecStatus::default())
    }

    async fn begin(&mut self) -> Result<(), DbError> {
        self.check("BEGIN")?;
        self.staged = Some(self.store.items());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.check("COMMIT")?;
        if self.store.fail_commit.load(Ordering::SeqCst) {
            return Err(DbError::Query("commit rejected".into()));
        }
        if let Some(staged) = self.staged.take() {
            *self.store.items.lock() = staged;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.check("ROLLBACK")?;
        self.store.rollbacks.fetch_add(1, Ordering::SeqCst);
        self.staged = None;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.staged.is_some()
    }

    async fn ping(&mut self) -> Result<(), DbError> {
        self.check("PING")
    }

    async fn close(self: Box<Self>) -> Result<(), DbError> {
        self.store.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_broken(&self) -> bool {
        self.broken
    }
}

pub struct MemoryDriver {
    store: Arc<Store>,
}

impl MemoryDriver {
    pub fn new(store: Arc<Store>) -> Arc<Self> {
        Arc::new(Self { store })
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn name(&self) -> &str {
        "memory"
    }

    fn placeholder(&self, _param_seq: usize, _param_name: &str) -> String {
        "?".to_string()
    }

    async fn connect(&self) -> Result<Box<dyn Connection>, DbError> {
        if self.store.unreachable.load(Ordering::SeqCst) {
            return Err(DbError::Connection("connection refused".into()));
        }
        self.store.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            store: self.store.clone(),
            staged: None,
            broken: false,
        }))
    }
}

pub fn options(min: usize, max: usize) -> PoolOptions {
    PoolOptions::new("localhost", "tester", "items")
        .backend("memory")
        .min_connections(min)
        .max_connections(max)
        .acquire_timeout_ms(1_000)
}

pub async fn session(store: &Arc<Store>, config: PoolConfig) -> Session {
    let pool = ConnectionPool::connect(config, MemoryDriver::new(store.clone()))
        .await
        .expect("pool");
    Session::new(pool)
}

/// Lets connections closed on spawned tasks finish.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
