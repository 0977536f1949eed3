//! Persistent vector index.
//!
//! [`LocalVectorStore`] keeps one JSON snapshot (`index.json`) inside the configured directory.
//! Builds are staged in a uniquely named temp file and renamed over the snapshot only after the
//! write has been flushed, so a crash mid-build leaves the previous snapshot untouched. Loaded
//! snapshots become an immutable [`VectorIndex`] that concurrent queries share through an `Arc`.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::embedding::cosine_similarity;
use crate::pipeline::Provenance;

/// File name of the persisted snapshot.
pub const SNAPSHOT_FILE: &str = "index.json";
const FORMAT_VERSION: u32 = 1;

/// Errors raised by the vector store.
#[derive(Debug, Error)]
pub enum IndexStoreError {
    /// Filesystem operation failed.
    #[error("index I/O failed at {path}: {source}")]
    Io {
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Snapshot could not be encoded or decoded.
    #[error("index snapshot is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Snapshot was written by an incompatible version.
    #[error("unsupported index format version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found on disk.
        found: u32,
        /// Version this build understands.
        expected: u32,
    },
    /// Records disagree on vector length.
    #[error("record {id} has dimension {actual}, expected {expected}")]
    InconsistentDimension {
        /// Offending record.
        id: String,
        /// Dimension of the first record.
        expected: usize,
        /// Dimension of the offending record.
        actual: usize,
    },
    /// Build was requested with no records.
    #[error("refusing to build an empty index")]
    Empty,
    /// Blocking worker failed.
    #[error("index worker failed: {0}")]
    Worker(String),
}

/// Persisted unit: chunk text, its embedding, and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Chunk identifier.
    pub id: String,
    /// Chunk text.
    pub text: String,
    /// Source document and pages.
    pub provenance: Provenance,
    /// Embedding vector.
    pub embedding: Vec<f32>,
}

/// Chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// Chunk identifier.
    pub id: String,
    /// Chunk text.
    pub text: String,
    /// Source document and pages.
    pub provenance: Provenance,
    /// Cosine similarity to the query vector.
    pub score: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    format_version: u32,
    model: String,
    dimension: usize,
    built_at: String,
    records: Vec<IndexRecord>,
}

/// Immutable, searchable index generation.
#[derive(Debug)]
pub struct VectorIndex {
    model: String,
    dimension: usize,
    built_at: String,
    records: Vec<IndexRecord>,
}

impl VectorIndex {
    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Vector length shared by every record.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embedding model that produced the vectors.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// RFC 3339 timestamp of the build.
    pub fn built_at(&self) -> &str {
        &self.built_at
    }

    /// Return up to `k` records ordered by descending cosine similarity.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<(usize, f32)> = self
            .records
            .iter()
            .enumerate()
            .map(|(idx, record)| (idx, cosine_similarity(query, &record.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(idx, score)| {
                let record = &self.records[idx];
                ScoredChunk {
                    id: record.id.clone(),
                    text: record.text.clone(),
                    provenance: record.provenance.clone(),
                    score,
                }
            })
            .collect()
    }

    fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            model: snapshot.model,
            dimension: snapshot.dimension,
            built_at: snapshot.built_at,
            records: snapshot.records,
        }
    }
}

/// Persistent store of index generations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist `records` as the new authoritative index, replacing any prior snapshot.
    async fn build(
        &self,
        records: Vec<IndexRecord>,
        model: &str,
    ) -> Result<Arc<VectorIndex>, IndexStoreError>;

    /// Reopen the persisted index; `None` when nothing (or nothing non-empty) was persisted.
    async fn load(&self) -> Result<Option<Arc<VectorIndex>>, IndexStoreError>;

    /// Whether a snapshot exists on disk.
    fn exists(&self) -> bool;
}

/// JSON-snapshot vector store rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalVectorStore {
    dir: PathBuf,
}

impl LocalVectorStore {
    /// Create a store persisting into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn build(
        &self,
        records: Vec<IndexRecord>,
        model: &str,
    ) -> Result<Arc<VectorIndex>, IndexStoreError> {
        let dimension = check_dimensions(&records)?;
        let built_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".into());
        let snapshot = Snapshot {
            format_version: FORMAT_VERSION,
            model: model.to_string(),
            dimension,
            built_at,
            records,
        };

        let dir = self.dir.clone();
        let snapshot = tokio::task::spawn_blocking(move || {
            write_snapshot(&dir, &snapshot)?;
            Ok::<_, IndexStoreError>(snapshot)
        })
        .await
        .map_err(|error| IndexStoreError::Worker(error.to_string()))??;

        tracing::info!(
            path = %self.snapshot_path().display(),
            records = snapshot.records.len(),
            dimension,
            "Persisted vector index"
        );
        Ok(Arc::new(VectorIndex::from_snapshot(snapshot)))
    }

    async fn load(&self) -> Result<Option<Arc<VectorIndex>>, IndexStoreError> {
        let path = self.snapshot_path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(IndexStoreError::Io { path, source }),
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        if snapshot.format_version != FORMAT_VERSION {
            return Err(IndexStoreError::UnsupportedVersion {
                found: snapshot.format_version,
                expected: FORMAT_VERSION,
            });
        }
        if snapshot.records.is_empty() {
            tracing::debug!(path = %path.display(), "Persisted index is empty");
            return Ok(None);
        }
        check_dimensions(&snapshot.records)?;

        tracing::info!(
            path = %path.display(),
            records = snapshot.records.len(),
            model = %snapshot.model,
            "Loaded persisted vector index"
        );
        Ok(Some(Arc::new(VectorIndex::from_snapshot(snapshot))))
    }

    fn exists(&self) -> bool {
        self.snapshot_path().is_file()
    }
}

fn check_dimensions(records: &[IndexRecord]) -> Result<usize, IndexStoreError> {
    let first = records.first().ok_or(IndexStoreError::Empty)?;
    let expected = first.embedding.len();
    for record in records {
        if record.embedding.len() != expected || expected == 0 {
            return Err(IndexStoreError::InconsistentDimension {
                id: record.id.clone(),
                expected,
                actual: record.embedding.len(),
            });
        }
    }
    Ok(expected)
}

fn write_snapshot(dir: &Path, snapshot: &Snapshot) -> Result<(), IndexStoreError> {
    std::fs::create_dir_all(dir).map_err(io_error(dir))?;
    let target = dir.join(SNAPSHOT_FILE);
    let staging = dir.join(format!("{SNAPSHOT_FILE}.tmp-{}", uuid::Uuid::new_v4()));

    let result = stage_and_swap(&staging, &target, snapshot);
    if result.is_err() {
        let _ = std::fs::remove_file(&staging);
    }
    result
}

fn stage_and_swap(staging: &Path, target: &Path, snapshot: &Snapshot) -> Result<(), IndexStoreError> {
    use std::io::Write;

    let file = std::fs::File::create(staging).map_err(io_error(staging))?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer(&mut writer, snapshot)?;
    writer.flush().map_err(io_error(staging))?;
    writer.get_ref().sync_all().map_err(io_error(staging))?;
    drop(writer);
    std::fs::rename(staging, target).map_err(io_error(target))
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> IndexStoreError {
    let path = path.to_path_buf();
    move |source| IndexStoreError::Io { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, text: &str, embedding: Vec<f32>) -> IndexRecord {
        IndexRecord {
            id: id.into(),
            text: text.into(),
            provenance: Provenance {
                source: "doc.pdf".into(),
                page_start: 1,
                page_end: 1,
            },
            embedding,
        }
    }

    #[tokio::test]
    async fn build_then_load_round_trips_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalVectorStore::new(dir.path());
        assert!(!store.exists());
        assert!(store.load().await.expect("load").is_none());

        let built = store
            .build(
                vec![
                    record("a", "alpha", vec![1.0, 0.0]),
                    record("b", "bravo", vec![0.0, 1.0]),
                ],
                "test-model",
            )
            .await
            .expect("build");
        assert_eq!(built.len(), 2);
        assert!(store.exists());

        let loaded = store.load().await.expect("load").expect("present");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dimension(), 2);
        assert_eq!(loaded.model(), "test-model");
        assert_eq!(loaded.built_at(), built.built_at());
    }

    #[tokio::test]
    async fn rebuild_replaces_previous_snapshot_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalVectorStore::new(dir.path());
        store
            .build(vec![record("old", "old text", vec![1.0, 0.0])], "m")
            .await
            .expect("first build");
        store
            .build(vec![record("new", "new text", vec![0.0, 1.0])], "m")
            .await
            .expect("second build");

        let loaded = store.load().await.expect("load").expect("present");
        let hits = loaded.search(&[1.0, 0.0], 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "new");

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from(SNAPSHOT_FILE)]);
    }

    #[tokio::test]
    async fn failed_build_keeps_prior_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalVectorStore::new(dir.path());
        store
            .build(vec![record("keep", "kept", vec![1.0, 0.0])], "m")
            .await
            .expect("first build");

        let err = store
            .build(
                vec![
                    record("x", "x", vec![1.0, 0.0]),
                    record("y", "y", vec![1.0, 0.0, 0.0]),
                ],
                "m",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IndexStoreError::InconsistentDimension { .. }));

        let err = store.build(Vec::new(), "m").await.unwrap_err();
        assert!(matches!(err, IndexStoreError::Empty));

        let loaded = store.load().await.expect("load").expect("present");
        assert_eq!(loaded.search(&[1.0, 0.0], 1)[0].id, "keep");
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(SNAPSHOT_FILE), b"{ not json").expect("write");
        let err = LocalVectorStore::new(dir.path()).load().await.unwrap_err();
        assert!(matches!(err, IndexStoreError::Serialization(_)));
    }

    #[test]
    fn search_orders_by_similarity_and_caps_results() {
        let index = VectorIndex {
            model: "m".into(),
            dimension: 2,
            built_at: String::new(),
            records: vec![
                record("far", "far", vec![0.0, 1.0]),
                record("near", "near", vec![1.0, 0.1]),
                record("mid", "mid", vec![1.0, 1.0]),
            ],
        };

        let hits = index.search(&[1.0, 0.0], 2);
        let ids: Vec<_> = hits.iter().map(|hit| hit.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(hits[0].score >= hits[1].score);

        assert_eq!(index.search(&[1.0, 0.0], 10).len(), 3);
    }
}
