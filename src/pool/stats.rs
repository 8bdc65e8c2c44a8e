//! Pool statistics

use serde::{Deserialize, Serialize};

/// Snapshot of a pool's bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Live connections (idle + borrowed)
    pub total: usize,
    pub idle: usize,
    pub borrowed: usize,
    /// Callers waiting in `borrow()`
    pub waiting: usize,
    pub max_size: usize,
}

impl PoolStats {
    /// Share of live connections currently borrowed, 0.0 when the pool is empty.
    pub fn utilization(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.borrowed as f64 / self.total as f64
        }
    }

    /// No idle connection left and no room to open another.
    pub fn is_full(&self) -> bool {
        self.idle == 0 && self.borrowed >= self.max_size
    }
}
