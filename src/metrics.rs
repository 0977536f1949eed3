use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing indexing and query activity.
#[derive(Default)]
pub struct PipelineMetrics {
    index_runs: AtomicU64,
    documents_indexed: AtomicU64,
    chunks_indexed: AtomicU64,
    last_index_duration_ms: AtomicU64,
    queries_served: AtomicU64,
    degraded_answers: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful index run.
    ///
    /// Document and chunk counts describe the latest generation, so they replace rather than
    /// accumulate.
    pub fn record_index(&self, documents: u64, chunks: u64, duration_ms: u64) {
        self.index_runs.fetch_add(1, Ordering::Relaxed);
        self.documents_indexed.store(documents, Ordering::Relaxed);
        self.chunks_indexed.store(chunks, Ordering::Relaxed);
        self.last_index_duration_ms
            .store(duration_ms, Ordering::Relaxed);
    }

    /// Record an answered query; `degraded` marks answers that carry a model error.
    pub fn record_query(&self, degraded: bool) {
        self.queries_served.fetch_add(1, Ordering::Relaxed);
        if degraded {
            self.degraded_answers.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            index_runs: self.index_runs.load(Ordering::Relaxed),
            documents_indexed: self.documents_indexed.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            last_index_duration_ms: self.last_index_duration_ms.load(Ordering::Relaxed),
            queries_served: self.queries_served.load(Ordering::Relaxed),
            degraded_answers: self.degraded_answers.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Successful index runs since startup.
    pub index_runs: u64,
    /// Documents in the latest index generation.
    pub documents_indexed: u64,
    /// Chunks in the latest index generation.
    pub chunks_indexed: u64,
    /// Wall-clock duration of the latest index run.
    pub last_index_duration_ms: u64,
    /// Queries answered since startup, degraded ones included.
    pub queries_served: u64,
    /// Answers returned with a language-model error.
    pub degraded_answers: u64,
}
