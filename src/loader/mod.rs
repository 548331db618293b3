//! Transactional bulk loading of records into a relational store.
//!
//! [`BatchLoader::bulk_insert`] splits records into chunks of at most `batch_size`, converts each
//! chunk to tabular form and writes it inside its own transaction:
//!
//! - a chunk is either fully committed or fully rolled back
//! - the first chunk that cannot be committed aborts the call with
//!   [`IngestionError::InsertFailure`]; earlier chunks stay committed
//! - the per-chunk attempt budget and whether failed attempts are retried come from
//!   [`RetryPolicy`]

mod observer;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{IngestionError, IngestionResult};
use crate::record::{Record, to_data_set};
use crate::types::DataSet;

pub use observer::{LoadEvent, LoadMetrics, LoadMetricsSnapshot, LoadObserver, TracingLoadObserver};

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConnection, SqliteTarget};

/// Default number of attempts per chunk.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Per-chunk retry policy.
///
/// The default fails fast: the first failed attempt rolls back and aborts, even though the
/// attempt budget is 3. Set `retry_on_failure` to spend the whole budget before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default)]
    pub retry_on_failure: bool,
}

fn default_max_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_on_failure: false,
        }
    }
}

impl RetryPolicy {
    /// Retry failed chunks until `max_attempts` is spent.
    pub fn retrying(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            retry_on_failure: true,
        }
    }
}

/// Something a [`BatchLoader`] can open connections to.
pub trait BulkTarget {
    type Connection: BulkConnection;

    /// Open a fresh connection; one is used for a whole `bulk_insert` call.
    fn connect(&self) -> IngestionResult<Self::Connection>;
}

/// A connection supporting explicit transactions and tabular bulk writes.
pub trait BulkConnection {
    fn begin(&mut self) -> IngestionResult<()>;

    /// Write every row of `chunk` into `table` inside the open transaction.
    fn write(&mut self, table: &str, chunk: &DataSet) -> IngestionResult<()>;

    fn commit(&mut self) -> IngestionResult<()>;

    fn rollback(&mut self) -> IngestionResult<()>;
}

/// Loads record slices into a [`BulkTarget`] chunk by chunk.
pub struct BatchLoader {
    policy: RetryPolicy,
    observer: Option<Arc<dyn LoadObserver>>,
    metrics: Arc<LoadMetrics>,
}

impl Default for BatchLoader {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl BatchLoader {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            observer: None,
            metrics: Arc::new(LoadMetrics::new()),
        }
    }

    /// Attach an observer for load events.
    pub fn with_observer(mut self, observer: Arc<dyn LoadObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Get a handle to real-time load metrics.
    pub fn metrics(&self) -> Arc<LoadMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Insert `records` into `table`, `batch_size` records per transaction.
    ///
    /// Returns the number of records written.
    pub fn bulk_insert<T, B>(
        &self,
        records: &[T],
        target: &B,
        table: &str,
        batch_size: usize,
    ) -> IngestionResult<usize>
    where
        T: Record,
        B: BulkTarget,
    {
        if batch_size == 0 {
            return Err(IngestionError::InvalidInput {
                message: "batch_size must be > 0".to_string(),
            });
        }
        if self.policy.max_attempts == 0 {
            return Err(IngestionError::InvalidInput {
                message: "retry policy max_attempts must be > 0".to_string(),
            });
        }

        let start = Instant::now();
        let ranges = chunk_ranges(records.len(), batch_size);
        self.metrics.begin_run();
        self.emit(LoadEvent::RunStarted {
            table: table.to_string(),
            records: records.len(),
            chunks: ranges.len(),
        });

        let result = self.write_chunks(records, target, table, ranges);
        let elapsed = start.elapsed();
        self.metrics.end_run(elapsed);
        match result {
            Ok(()) => {
                self.emit(LoadEvent::RunFinished {
                    elapsed,
                    metrics: self.metrics.snapshot(),
                });
                tracing::info!(table, records = records.len(), "bulk insert committed");
                Ok(records.len())
            }
            Err(e) => {
                self.emit(LoadEvent::RunFailed {
                    elapsed,
                    error: e.to_string(),
                    metrics: self.metrics.snapshot(),
                });
                tracing::warn!(table, records = records.len(), error = %e, "bulk insert aborted");
                Err(e)
            }
        }
    }

    fn write_chunks<T, B>(
        &self,
        records: &[T],
        target: &B,
        table: &str,
        ranges: Vec<Range<usize>>,
    ) -> IngestionResult<()>
    where
        T: Record,
        B: BulkTarget,
    {
        let mut conn = target.connect()?;
        for (index, range) in ranges.into_iter().enumerate() {
            let chunk = to_data_set(&records[range]);
            self.emit(LoadEvent::ChunkStarted {
                index,
                rows: chunk.row_count(),
            });
            self.insert_chunk(&mut conn, table, index, &chunk)?;
        }
        Ok(())
    }

    fn insert_chunk<C: BulkConnection>(
        &self,
        conn: &mut C,
        table: &str,
        index: usize,
        chunk: &DataSet,
    ) -> IngestionResult<()> {
        let mut remaining = self.policy.max_attempts;
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.metrics.on_attempt();
            let err = match try_write(conn, table, chunk) {
                Ok(()) => {
                    self.metrics.on_chunk_committed(chunk.row_count());
                    self.emit(LoadEvent::ChunkCommitted {
                        index,
                        rows: chunk.row_count(),
                        attempt,
                    });
                    return Ok(());
                }
                Err(e) => e,
            };

            if let Err(rb) = conn.rollback() {
                tracing::warn!(table, chunk = index, error = %rb, "rollback failed");
            }
            self.metrics.on_rollback();
            remaining -= 1;
            self.emit(LoadEvent::ChunkRolledBack {
                index,
                attempt,
                error: err.to_string(),
            });

            if !self.policy.retry_on_failure || remaining == 0 {
                return Err(IngestionError::InsertFailure {
                    table: table.to_string(),
                    chunk: index,
                    attempts: attempt,
                    message: err.to_string(),
                });
            }
            tracing::debug!(table, chunk = index, attempt, remaining, "retrying chunk");
        }
    }

    fn emit(&self, event: LoadEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

fn try_write<C: BulkConnection>(conn: &mut C, table: &str, chunk: &DataSet) -> IngestionResult<()> {
    conn.begin()?;
    conn.write(table, chunk)?;
    conn.commit()
}

/// Insert with the default fail-fast [`RetryPolicy`].
pub fn bulk_insert<T: Record, B: BulkTarget>(
    records: &[T],
    target: &B,
    table: &str,
    batch_size: usize,
) -> IngestionResult<usize> {
    BatchLoader::default().bulk_insert(records, target, table, batch_size)
}

/// Split `0..len` into consecutive ranges of at most `chunk_size`.
pub fn chunk_ranges(len: usize, chunk_size: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(len.div_ceil(chunk_size));
    let mut start = 0usize;
    while start < len {
        let end = (start + chunk_size).min(len);
        out.push(start..end);
        start = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::chunk_ranges;

    #[test]
    fn chunk_ranges_cover_input() {
        assert!(chunk_ranges(0, 3).is_empty());
        assert_eq!(chunk_ranges(3, 3), vec![0..3]);
        assert_eq!(chunk_ranges(7, 3), vec![0..3, 3..6, 6..7]);
        assert_eq!(chunk_ranges(2, 10), vec![0..2]);
    }

    #[test]
    fn chunk_count_is_ceiling() {
        for len in 0..50 {
            for size in 1..8 {
                assert_eq!(chunk_ranges(len, size).len(), len.div_ceil(size));
            }
        }
    }
}
