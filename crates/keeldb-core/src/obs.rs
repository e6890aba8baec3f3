//! Operation counters owned by the table set, not process-global state.
//! Execution logic records through [`Metrics`]; endpoints and tests read a
//! [`MetricsSnapshot`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

///
/// OpKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpKind {
    Row,
    List,
    Insert,
    Update,
    Del,
    DelWhere,
    Count,
    Query,
}

impl OpKind {
    const COUNT: usize = 8;

    const fn index(self) -> usize {
        match self {
            Self::Row => 0,
            Self::List => 1,
            Self::Insert => 2,
            Self::Update => 3,
            Self::Del => 4,
            Self::DelWhere => 5,
            Self::Count => 6,
            Self::Query => 7,
        }
    }
}

///
/// Metrics
///
/// Lock-free call and row counters shared by every table of one set.
///

#[derive(Debug, Default)]
pub struct Metrics {
    calls: [AtomicU64; OpKind::COUNT],
    rows_read: AtomicU64,
    rows_written: AtomicU64,
    backend_errors: AtomicU64,
    cache_rebuilds: AtomicU64,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_call(&self, op: OpKind) {
        self.calls[op.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows_read(&self, rows: u64) {
        self.rows_read.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn add_rows_written(&self, rows: u64) {
        self.rows_written.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn record_backend_error(&self) {
        self.backend_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_rebuild(&self) {
        self.cache_rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let calls = |op: OpKind| self.calls[op.index()].load(Ordering::Relaxed);

        MetricsSnapshot {
            row_calls: calls(OpKind::Row),
            list_calls: calls(OpKind::List),
            insert_calls: calls(OpKind::Insert),
            update_calls: calls(OpKind::Update),
            del_calls: calls(OpKind::Del),
            del_where_calls: calls(OpKind::DelWhere),
            count_calls: calls(OpKind::Count),
            query_calls: calls(OpKind::Query),
            rows_read: self.rows_read.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
            cache_rebuilds: self.cache_rebuilds.load(Ordering::Relaxed),
        }
    }
}

///
/// MetricsSnapshot
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub row_calls: u64,
    pub list_calls: u64,
    pub insert_calls: u64,
    pub update_calls: u64,
    pub del_calls: u64,
    pub del_where_calls: u64,
    pub count_calls: u64,
    pub query_calls: u64,
    pub rows_read: u64,
    pub rows_written: u64,
    pub backend_errors: u64,
    pub cache_rebuilds: u64,
}
