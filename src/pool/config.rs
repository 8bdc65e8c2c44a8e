//! Pool sizing and checkout policy

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DbError;

/// What `borrow()` does when every connection is in use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquirePolicy {
    /// Wait up to the acquire timeout, then fail with `PoolTimeout`.
    #[default]
    Wait,
    /// Fail immediately with `PoolExhausted`.
    FailFast,
}

/// Sizing, timeouts and validation settings of a [`ConnectionPool`](super::ConnectionPool).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    min_size: usize,
    max_size: usize,
    acquire_timeout_ms: u64,
    acquire_policy: AcquirePolicy,
    idle_timeout_ms: u64,
    max_lifetime_ms: Option<u64>,
    test_on_borrow: bool,
}

impl PoolConfig {
    /// Fails with `Configuration` when `max_size` is 0 or `min_size > max_size`.
    pub fn new(min_size: usize, max_size: usize) -> Result<Self, DbError> {
        if max_size == 0 {
            return Err(DbError::Configuration(
                "max_connections must be at least 1".into(),
            ));
        }
        if min_size > max_size {
            return Err(DbError::Configuration(format!(
                "min_connections ({}) cannot exceed max_connections ({})",
                min_size, max_size
            )));
        }

        Ok(Self {
            min_size,
            max_size,
            acquire_timeout_ms: 30_000,
            acquire_policy: AcquirePolicy::Wait,
            idle_timeout_ms: 600_000,
            max_lifetime_ms: None,
            test_on_borrow: false,
        })
    }

    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    pub fn with_acquire_policy(mut self, policy: AcquirePolicy) -> Self {
        self.acquire_policy = policy;
        self
    }

    pub fn with_idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_lifetime_ms(mut self, lifetime_ms: Option<u64>) -> Self {
        self.max_lifetime_ms = lifetime_ms;
        self
    }

    /// Ping idle connections before handing them out.
    pub fn with_test_on_borrow(mut self, enabled: bool) -> Self {
        self.test_on_borrow = enabled;
        self
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn acquire_policy(&self) -> AcquirePolicy {
        self.acquire_policy
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime_ms.map(Duration::from_millis)
    }

    pub fn test_on_borrow(&self) -> bool {
        self.test_on_borrow
    }
}

impl Default for PoolConfig {
    /// min 1, max 10, 30s acquire timeout, 10 min idle timeout.
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 10,
            acquire_timeout_ms: 30_000,
            acquire_policy: AcquirePolicy::Wait,
            idle_timeout_ms: 600_000,
            max_lifetime_ms: None,
            test_on_borrow: false,
        }
    }
}
