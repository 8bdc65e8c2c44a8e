//! Bounded connection pool implementation

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::{debug, info, warn};

use crate::error::DbError;
use crate::udbc::connection::Connection;
use crate::udbc::driver::Driver;

use super::config::{AcquirePolicy, PoolConfig};
use super::stats::PoolStats;

/// A live connection plus the timestamps used for expiry checks.
pub(crate) struct Entry {
    connection: Box<dyn Connection>,
    created_at: Instant,
    last_used_at: Instant,
}

impl Entry {
    fn new(connection: Box<dyn Connection>) -> Self {
        let now = Instant::now();
        Self {
            connection,
            created_at: now,
            last_used_at: now,
        }
    }

    fn touch(&mut self) {
        self.last_used_at = Instant::now();
    }
}

/// Bookkeeping guarded by the pool's single mutex.
struct PoolState {
    idle: VecDeque<Entry>,
    borrowed: usize,
    closed: bool,
}

/// Bounded set of connections shared by concurrent callers.
///
/// At most `max_size` connections are live at once: a semaphore with
/// `max_size` permits bounds borrowers, a connection is only opened when
/// the idle queue is empty, and a returned connection re-enters the idle
/// queue before its permit is released.
pub struct ConnectionPool {
    config: PoolConfig,
    driver: Arc<dyn Driver>,
    state: Mutex<PoolState>,
    semaphore: Arc<Semaphore>,
    waiting: AtomicUsize,
}

impl ConnectionPool {
    /// Creates the pool and eagerly opens `min_size` connections.
    ///
    /// If the store cannot be reached the connections opened so far are
    /// closed and `DbError::Configuration` is returned.
    pub async fn connect(config: PoolConfig, driver: Arc<dyn Driver>) -> Result<Arc<Self>, DbError> {
        let mut idle = VecDeque::with_capacity(config.max_size());
        for _ in 0..config.min_size() {
            match driver.connect().await {
                Ok(connection) => idle.push_back(Entry::new(connection)),
                Err(e) => {
                    for entry in idle.drain(..) {
                        let _ = entry.connection.close().await;
                    }
                    return Err(DbError::Configuration(format!(
                        "backing store unreachable: {}",
                        e
                    )));
                }
            }
        }

        debug!(
            component = "pool",
            driver = driver.name(),
            opened = idle.len(),
            max_size = config.max_size(),
            "connection pool created"
        );

        Ok(Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(config.max_size())),
            config,
            driver,
            state: Mutex::new(PoolState {
                idle,
                borrowed: 0,
                closed: false,
            }),
            waiting: AtomicUsize::new(0),
        }))
    }

    /// Checks out a connection.
    ///
    /// Reuses an idle connection when one passes the expiry checks, opens a
    /// new one while the pool is below `max_size`, and otherwise waits or
    /// fails according to the configured [`AcquirePolicy`].
    pub async fn borrow(self: &Arc<Self>) -> Result<PooledConnection, DbError> {
        if self.is_closed() {
            return Err(DbError::PoolClosed);
        }

        let permit = self.acquire_permit().await?;

        let entry = match self.take_idle().await {
            Some(entry) => entry,
            None => {
                let connection = self.driver.connect().await.inspect_err(|e| {
                    warn!(component = "pool", error = %e, "failed to open connection");
                })?;
                debug!(component = "pool", "opened new connection");
                Entry::new(connection)
            }
        };

        {
            let mut state = self.state.lock();
            if !state.closed {
                state.borrowed += 1;
                return Ok(PooledConnection {
                    entry: Some(entry),
                    pool: Arc::clone(self),
                    _permit: permit,
                });
            }
        }

        close_in_background(entry.connection);
        Err(DbError::PoolClosed)
    }

    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit, DbError> {
        match self.config.acquire_policy() {
            AcquirePolicy::FailFast => {
                self.semaphore
                    .clone()
                    .try_acquire_owned()
                    .map_err(|e| match e {
                        TryAcquireError::Closed => DbError::PoolClosed,
                        TryAcquireError::NoPermits => {
                            DbError::PoolExhausted(self.config.max_size())
                        }
                    })
            }
            AcquirePolicy::Wait => {
                let _waiting = WaitingGuard::new(&self.waiting);
                let timeout = self.config.acquire_timeout();
                match tokio::time::timeout(timeout, self.semaphore.clone().acquire_owned()).await {
                    Ok(Ok(permit)) => Ok(permit),
                    Ok(Err(_)) => Err(DbError::PoolClosed),
                    Err(_) => {
                        warn!(component = "pool", ?timeout, "timed out waiting for a connection");
                        Err(DbError::PoolTimeout(timeout))
                    }
                }
            }
        }
    }

    /// Pops idle connections until one passes lifetime, idle and ping checks.
    async fn take_idle(&self) -> Option<Entry> {
        loop {
            let mut entry = self.state.lock().idle.pop_front()?;

            if let Some(max_lifetime) = self.config.max_lifetime() {
                if entry.created_at.elapsed() > max_lifetime {
                    debug!(component = "pool", "closing connection past max lifetime");
                    let _ = entry.connection.close().await;
                    continue;
                }
            }

            if entry.last_used_at.elapsed() > self.config.idle_timeout() {
                debug!(component = "pool", "closing connection idle past timeout");
                let _ = entry.connection.close().await;
                continue;
            }

            if self.config.test_on_borrow() {
                if let Err(e) = entry.connection.ping().await {
                    warn!(component = "pool", error = %e, "idle connection failed validation");
                    let _ = entry.connection.close().await;
                    continue;
                }
            }

            entry.touch();
            return Some(entry);
        }
    }

    /// Hands a borrowed connection back and frees its borrow slot.
    ///
    /// An absent connection only frees the slot. Broken connections, ones
    /// still inside a transaction and anything returned after shutdown are
    /// closed instead of re-entering the idle queue.
    pub(crate) fn release(&self, entry: Option<Entry>) {
        let discarded = {
            let mut state = self.state.lock();
            state.borrowed = state.borrowed.saturating_sub(1);

            match entry {
                None => None,
                Some(mut entry) => {
                    let reason = if state.closed {
                        Some("pool closed")
                    } else if entry.connection.is_broken() {
                        Some("connection broken")
                    } else if entry.connection.in_transaction() {
                        Some("transaction left open")
                    } else {
                        None
                    };

                    match reason {
                        Some(reason) => Some((entry, reason)),
                        None => {
                            entry.touch();
                            state.idle.push_back(entry);
                            None
                        }
                    }
                }
            }
        };

        if let Some((entry, reason)) = discarded {
            info!(component = "pool", reason, "discarding returned connection");
            close_in_background(entry.connection);
        }
    }

    /// Closes the pool: waiters fail with `PoolClosed`, idle connections are
    /// closed now, borrowed ones are closed when their borrower returns them.
    pub async fn close_all(&self) {
        let (idle, borrowed) = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            (state.idle.drain(..).collect::<Vec<_>>(), state.borrowed)
        };
        self.semaphore.close();

        let closed = idle.len();
        for entry in idle {
            if let Err(e) = entry.connection.close().await {
                debug!(component = "pool", error = %e, "error closing idle connection");
            }
        }

        info!(
            component = "pool",
            closed_idle = closed,
            still_borrowed = borrowed,
            "connection pool shut down"
        );
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            total: state.idle.len() + state.borrowed,
            idle: state.idle.len(),
            borrowed: state.borrowed,
            waiting: self.waiting.load(Ordering::SeqCst),
            max_size: self.config.max_size(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("driver", &self.driver.name())
            .field("config", &self.config)
            .field("stats", &self.stats())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn close_in_background(connection: Box<dyn Connection>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(e) = connection.close().await {
                    debug!(component = "pool", error = %e, "error closing discarded connection");
                }
            });
        }
        Err(_) => drop(connection),
    }
}

struct WaitingGuard<'a>(&'a AtomicUsize);

impl<'a> WaitingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A connection checked out of the pool.
///
/// Dropping it returns the connection, on every path including errors and
/// cancelled futures.
pub struct PooledConnection {
    entry: Option<Entry>,
    pool: Arc<ConnectionPool>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// The underlying session. Fails with `PoolClosed` once the pool has shut down.
    pub fn connection(&mut self) -> Result<&mut dyn Connection, DbError> {
        if self.pool.is_closed() {
            return Err(DbError::PoolClosed);
        }
        match self.entry.as_mut() {
            Some(entry) => Ok(entry.connection.as_mut()),
            None => Err(DbError::PoolClosed),
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|e| e.connection.in_transaction())
    }

    pub fn is_broken(&self) -> bool {
        self.entry
            .as_ref()
            .is_none_or(|e| e.connection.is_broken())
    }

    /// Returns the connection now instead of at the end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.pool.release(self.entry.take());
    }
}
