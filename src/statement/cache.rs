use crate::statement::parser::{Segment, parse_statement};
use dashmap::DashMap;
use std::sync::{Arc, LazyLock};

const MAX_CACHED_STATEMENTS: usize = 1024;

/// Parsed statements keyed by their SQL text.
pub(crate) static STATEMENT_CACHE: LazyLock<StatementCache> =
    LazyLock::new(|| StatementCache::new(MAX_CACHED_STATEMENTS));

/// Bounded parse cache. Once full, new SQL is parsed on every call and
/// never stored, so caller-built text cannot grow it without limit.
pub(crate) struct StatementCache {
    entries: DashMap<String, Arc<Vec<Segment>>>,
    capacity: usize,
}

impl StatementCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn get_segments(&self, sql: &str) -> Arc<Vec<Segment>> {
        if let Some(cached) = self.entries.get(sql) {
            return cached.clone();
        }

        let segments = Arc::new(parse_statement(sql));
        if self.entries.len() < self.capacity {
            self.entries
                .entry(sql.to_string())
                .or_insert_with(|| segments.clone());
        }
        segments
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

pub(crate) fn get_segments(sql: &str) -> Arc<Vec<Segment>> {
    STATEMENT_CACHE.get_segments(sql)
}
