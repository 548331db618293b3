use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Load events emitted by [`super::BatchLoader`].
///
/// Chunk indexes are zero-based.
#[derive(Debug, Clone)]
pub enum LoadEvent {
    RunStarted {
        table: String,
        records: usize,
        chunks: usize,
    },
    ChunkStarted {
        index: usize,
        rows: usize,
    },
    ChunkCommitted {
        index: usize,
        rows: usize,
        attempt: usize,
    },
    ChunkRolledBack {
        index: usize,
        attempt: usize,
        error: String,
    },
    RunFinished {
        elapsed: Duration,
        metrics: LoadMetricsSnapshot,
    },
    /// The run stopped early; chunks committed before the failure stay committed.
    RunFailed {
        elapsed: Duration,
        error: String,
        metrics: LoadMetricsSnapshot,
    },
}

/// Observer hook for load events.
pub trait LoadObserver: Send + Sync {
    fn on_event(&self, event: &LoadEvent);
}

/// Forwards load events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingLoadObserver;

impl LoadObserver for TracingLoadObserver {
    fn on_event(&self, event: &LoadEvent) {
        match event {
            LoadEvent::ChunkRolledBack {
                index,
                attempt,
                error,
            } => tracing::warn!(chunk = index, attempt, %error, "chunk rolled back"),
            LoadEvent::RunFinished { elapsed, metrics } => {
                tracing::info!(?elapsed, %metrics, "load run finished")
            }
            LoadEvent::RunFailed {
                elapsed,
                error,
                metrics,
            } => tracing::warn!(?elapsed, %error, %metrics, "load run failed"),
            other => tracing::debug!(event = ?other, "load event"),
        }
    }
}

/// Real-time metrics for the current load run.
///
/// The loader updates these counters while it runs; callers can snapshot them at any time.
pub struct LoadMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,

    attempts: AtomicU64,
    chunks_committed: AtomicU64,
    rows_committed: AtomicU64,
    rollbacks: AtomicU64,
}

impl LoadMetrics {
    pub fn new() -> Self {
        Self {
            run_id: AtomicU64::new(0),
            elapsed_ns: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            chunks_committed: AtomicU64::new(0),
            rows_committed: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
        }
    }

    pub fn begin_run(&self) {
        let _ = self.run_id.fetch_add(1, Ordering::SeqCst);
        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.attempts.store(0, Ordering::SeqCst);
        self.chunks_committed.store(0, Ordering::SeqCst);
        self.rows_committed.store(0, Ordering::SeqCst);
        self.rollbacks.store(0, Ordering::SeqCst);
    }

    pub fn end_run(&self, elapsed: Duration) {
        // Clamped to 1ns so a finished run always reports `Some(elapsed)`.
        let ns = elapsed.as_nanos().clamp(1, u64::MAX as u128) as u64;
        self.elapsed_ns.store(ns, Ordering::SeqCst);
    }

    pub fn on_attempt(&self) {
        let _ = self.attempts.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_chunk_committed(&self, rows: usize) {
        let _ = self.chunks_committed.fetch_add(1, Ordering::SeqCst);
        let _ = self.rows_committed.fetch_add(rows as u64, Ordering::SeqCst);
    }

    pub fn on_rollback(&self) {
        let _ = self.rollbacks.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> LoadMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = if elapsed_ns > 0 {
            Some(Duration::from_nanos(elapsed_ns))
        } else {
            None
        };

        LoadMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed,
            attempts: self.attempts.load(Ordering::SeqCst),
            chunks_committed: self.chunks_committed.load(Ordering::SeqCst),
            rows_committed: self.rows_committed.load(Ordering::SeqCst),
            rollbacks: self.rollbacks.load(Ordering::SeqCst),
        }
    }
}

impl Default for LoadMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable snapshot of [`LoadMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub attempts: u64,
    pub chunks_committed: u64,
    pub rows_committed: u64,
    pub rollbacks: u64,
}

impl fmt::Display for LoadMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, chunks_committed={}, rows_committed={}, attempts={}, rollbacks={}, elapsed={:?}",
            self.run_id,
            self.chunks_committed,
            self.rows_committed,
            self.attempts,
            self.rollbacks,
            self.elapsed
        )
    }
}
