use std::future::Future;
use std::sync::{Arc, LazyLock};

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::DbError;
use crate::executor::session::Session;
use crate::models::db_config::PoolOptions;
use crate::pool::ConnectionPool;
use crate::udbc::driver::Driver;
#[cfg(feature = "mysql")]
use crate::udbc_mysql::MysqlDriver;

/// Process-wide pool guard.
pub static DB: LazyLock<PoolManager> = LazyLock::new(PoolManager::new);

/// Returns the process-wide [`PoolManager`].
pub fn pool_mgr() -> &'static PoolManager {
    &DB
}

type Slot = Arc<Mutex<Option<Arc<ConnectionPool>>>>;

/// Owns at most one connection pool and controls when it is created and
/// shut down.
///
/// Initialization runs under the slot lock, so concurrent callers observe a
/// single pool.
pub struct PoolManager {
    slot: Slot,
}

impl Default for PoolManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolManager {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates the pool from `options`, or returns the existing one.
    pub async fn init(&self, options: &PoolOptions) -> Result<Arc<ConnectionPool>, DbError> {
        self.acquire(options, None).await.map(|(pool, _)| pool)
    }

    /// Like [`init`](Self::init) with a caller-supplied driver.
    pub async fn init_with(
        &self,
        options: &PoolOptions,
        driver: Arc<dyn Driver>,
    ) -> Result<Arc<ConnectionPool>, DbError> {
        self.acquire(options, Some(driver)).await.map(|(pool, _)| pool)
    }

    /// The current pool, initialized from the environment on first use.
    pub async fn pool(&self) -> Result<Arc<ConnectionPool>, DbError> {
        if let Some(pool) = self.slot.lock().await.as_ref() {
            return Ok(pool.clone());
        }
        let options = PoolOptions::from_env().inspect_err(|e| {
            error!(component = "pool", error = %e, "invalid pool configuration");
        })?;
        self.init(&options).await
    }

    pub async fn session(&self) -> Result<Session, DbError> {
        self.pool().await.map(Session::new)
    }

    /// Closes and forgets the pool. Does nothing when none exists.
    pub async fn shutdown(&self) {
        let pool = self.slot.lock().await.take();
        if let Some(pool) = pool {
            pool.close_all().await;
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Enters a pool scope. The scope that creates the pool owns it and
    /// shuts it down when it ends.
    pub async fn enter(&self, options: &PoolOptions) -> Result<PoolScope, DbError> {
        let (pool, owner) = self.acquire(options, None).await?;
        Ok(self.scope(pool, owner))
    }

    pub async fn enter_with(
        &self,
        options: &PoolOptions,
        driver: Arc<dyn Driver>,
    ) -> Result<PoolScope, DbError> {
        let (pool, owner) = self.acquire(options, Some(driver)).await?;
        Ok(self.scope(pool, owner))
    }

    /// Runs `body` inside a pool scope; the pool is shut down afterwards if
    /// this scope created it, whether `body` succeeds or not.
    pub async fn scoped<F, Fut, T, E>(&self, options: &PoolOptions, body: F) -> Result<T, E>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        let scope = self.enter(options).await?;
        let result = body(scope.session()).await;
        scope.close().await;
        result
    }

    fn scope(&self, pool: Arc<ConnectionPool>, owner: bool) -> PoolScope {
        PoolScope {
            slot: self.slot.clone(),
            pool,
            owner,
            finished: false,
        }
    }

    async fn acquire(
        &self,
        options: &PoolOptions,
        driver: Option<Arc<dyn Driver>>,
    ) -> Result<(Arc<ConnectionPool>, bool), DbError> {
        let mut slot = self.slot.lock().await;
        if let Some(pool) = slot.as_ref() {
            return Ok((pool.clone(), false));
        }

        let pool = Self::open(options, driver).await.inspect_err(|e| {
            error!(component = "pool", error = %e, "pool initialization failed");
        })?;
        info!(
            component = "pool",
            backend = pool.driver().name(),
            host = %options.host,
            database = %options.database_name,
            min_size = pool.config().min_size(),
            max_size = pool.config().max_size(),
            "connection pool initialized"
        );
        *slot = Some(pool.clone());
        Ok((pool, true))
    }

    async fn open(
        options: &PoolOptions,
        driver: Option<Arc<dyn Driver>>,
    ) -> Result<Arc<ConnectionPool>, DbError> {
        options.validate()?;
        let driver = match driver {
            Some(driver) => driver,
            None => driver_for(options)?,
        };
        ConnectionPool::connect(options.pool_config()?, driver).await
    }
}

fn driver_for(options: &PoolOptions) -> Result<Arc<dyn Driver>, DbError> {
    match options.backend.as_str() {
        #[cfg(feature = "mysql")]
        "mysql" => Ok(Arc::new(MysqlDriver::new(options))),
        other => Err(DbError::Configuration(format!(
            "unsupported backend: {}",
            other
        ))),
    }
}

/// A pool acquisition scope.
///
/// An owning scope shuts the pool down exactly once: through
/// [`close`](Self::close), or on drop when the scope is left early. The
/// drop path needs a tokio runtime to close connections; without one the
/// pool is only detached from its manager.
pub struct PoolScope {
    slot: Slot,
    pool: Arc<ConnectionPool>,
    owner: bool,
    finished: bool,
}

impl PoolScope {
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn session(&self) -> Session {
        Session::new(self.pool.clone())
    }

    /// Whether this scope created the pool and will shut it down.
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    pub async fn close(mut self) {
        self.finished = true;
        if self.owner {
            detach(&self.slot, &self.pool).await;
            self.pool.close_all().await;
        }
    }
}

impl Drop for PoolScope {
    fn drop(&mut self) {
        if self.finished || !self.owner {
            return;
        }
        let slot = self.slot.clone();
        let pool = self.pool.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    detach(&slot, &pool).await;
                    pool.close_all().await;
                });
            }
            Err(_) => {
                warn!(component = "pool", "pool scope dropped outside a runtime");
                if let Ok(mut guard) = slot.try_lock() {
                    if guard.as_ref().is_some_and(|p| Arc::ptr_eq(p, &pool)) {
                        guard.take();
                    }
                }
            }
        }
    }
}

/// Clears the slot only if it still holds `pool`; a later pool is left alone.
async fn detach(slot: &Slot, pool: &Arc<ConnectionPool>) {
    let mut guard = slot.lock().await;
    if guard.as_ref().is_some_and(|p| Arc::ptr_eq(p, pool)) {
        guard.take();
    }
}
