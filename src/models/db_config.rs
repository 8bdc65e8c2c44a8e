use std::fmt;

use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};

use crate::error::DbError;
use crate::pool::{AcquirePolicy, PoolConfig};
use crate::udbc::DEFAULT_BACKEND;

/// Environment prefix for every pool option, e.g. `DB_HOST`.
pub const ENV_PREFIX: &str = "DB_";

/// Connection and sizing options for the process-wide pool.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    pub backend: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database_name: String,
    pub min_connections: usize,
    pub max_connections: usize,
    pub acquire_timeout_ms: u64,
    pub acquire_policy: AcquirePolicy,
    pub idle_timeout_ms: u64,
    pub max_lifetime_ms: Option<u64>,
    pub test_on_borrow: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            host: String::new(),
            port: 3306,
            user: String::new(),
            password: String::new(),
            database_name: String::new(),
            min_connections: 1,
            max_connections: 10,
            acquire_timeout_ms: 30_000,
            acquire_policy: AcquirePolicy::Wait,
            idle_timeout_ms: 600_000,
            max_lifetime_ms: None,
            test_on_borrow: false,
        }
    }
}

impl fmt::Debug for PoolOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolOptions")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database_name", &self.database_name)
            .field("min_connections", &self.min_connections)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_ms", &self.acquire_timeout_ms)
            .field("acquire_policy", &self.acquire_policy)
            .field("idle_timeout_ms", &self.idle_timeout_ms)
            .field("max_lifetime_ms", &self.max_lifetime_ms)
            .field("test_on_borrow", &self.test_on_borrow)
            .finish()
    }
}

impl PoolOptions {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        database_name: impl Into<String>,
    ) -> Self {
        PoolOptions {
            host: host.into(),
            user: user.into(),
            database_name: database_name.into(),
            ..Default::default()
        }
    }

    /// Loads `.env` (never overriding variables already set) and then
    /// reads `DB_*` variables on top of the defaults.
    pub fn from_env() -> Result<Self, DbError> {
        let _ = dotenvy::dotenv();
        Self::from_figment(Figment::new().merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Extracts options from `figment` layered over the defaults.
    pub fn from_figment(figment: Figment) -> Result<Self, DbError> {
        let options: PoolOptions = Figment::from(Serialized::defaults(PoolOptions::default()))
            .merge(figment)
            .extract()?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), DbError> {
        for (field, value) in [
            ("host", &self.host),
            ("user", &self.user),
            ("database_name", &self.database_name),
        ] {
            if value.trim().is_empty() {
                return Err(DbError::Configuration(format!("{} is required", field)));
            }
        }
        if self.backend.trim().is_empty() {
            return Err(DbError::Configuration("backend is required".into()));
        }
        // sizing rules live in PoolConfig
        self.pool_config().map(|_| ())
    }

    /// Pool sizing and checkout settings derived from these options.
    pub fn pool_config(&self) -> Result<PoolConfig, DbError> {
        Ok(PoolConfig::new(self.min_connections, self.max_connections)?
            .with_acquire_timeout_ms(self.acquire_timeout_ms)
            .with_acquire_policy(self.acquire_policy)
            .with_idle_timeout_ms(self.idle_timeout_ms)
            .with_max_lifetime_ms(self.max_lifetime_ms)
            .with_test_on_borrow(self.test_on_borrow))
    }

    pub fn backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn min_connections(mut self, min_connections: usize) -> Self {
        self.min_connections = min_connections;
        self
    }

    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    pub fn acquire_policy(mut self, policy: AcquirePolicy) -> Self {
        self.acquire_policy = policy;
        self
    }

    pub fn idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = timeout_ms;
        self
    }

    pub fn max_lifetime_ms(mut self, lifetime_ms: u64) -> Self {
        self.max_lifetime_ms = Some(lifetime_ms);
        self
    }

    pub fn test_on_borrow(mut self, enabled: bool) -> Self {
        self.test_on_borrow = enabled;
        self
    }
}
