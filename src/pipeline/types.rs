//! Core data types and error definitions for the question-answering pipeline.

use serde::Serialize;
use thiserror::Error;

use crate::embedding::EmbeddingClientError;
use crate::index::IndexStoreError;

use super::chunking::Provenance;

/// Errors produced while splitting text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Chunk size must be positive.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must be strictly smaller than the chunk size.
    #[error("chunk overlap {chunk_overlap} must be smaller than chunk size {chunk_size}")]
    OverlapTooLarge {
        /// Configured chunk size.
        chunk_size: usize,
        /// Configured overlap.
        chunk_overlap: usize,
    },
}

/// Errors surfaced by [`crate::pipeline::RagPipeline::index`]. None of them alter pipeline state.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Source directory is missing or holds no loadable documents.
    #[error("no documents found in {0}")]
    NoDocumentsFound(String),
    /// Documents loaded but produced no text to index.
    #[error("documents contained no indexable text")]
    NoChunks,
    /// Chunking parameters were rejected.
    #[error("failed to chunk documents: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed.
    #[error("embedding service failed: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Embedding provider returned the wrong number of vectors.
    #[error("embedding service returned {actual} vectors for {expected} chunks")]
    EmbeddingCountMismatch {
        /// Number of chunks submitted.
        expected: usize,
        /// Number of vectors returned.
        actual: usize,
    },
    /// Vector index could not be persisted.
    #[error("failed to build vector index: {0}")]
    Build(#[from] IndexStoreError),
}

/// Errors surfaced by [`crate::pipeline::RagPipeline::query`].
#[derive(Debug, Error)]
pub enum QueryError {
    /// No index is loaded yet.
    #[error("no documents have been indexed yet; run indexing first")]
    NotReady,
    /// Question was blank.
    #[error("question must not be empty")]
    EmptyQuestion,
    /// Embedding provider failed for the question.
    #[error("embedding service failed: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Embedding provider returned no vectors.
    #[error("embedding provider returned no vector for the question")]
    EmptyEmbedding,
    /// Question vector does not match the index dimension.
    #[error("embedding dimension mismatch: index has {expected}, question has {actual}")]
    DimensionMismatch {
        /// Dimension stored in the index.
        expected: usize,
        /// Dimension of the question embedding.
        actual: usize,
    },
}

/// Lifecycle state of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    /// No index is available; queries are rejected.
    Unindexed,
    /// An index with at least one record is loaded.
    Ready,
}

/// Snapshot returned by [`crate::pipeline::PipelineApi::status`].
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    /// Current lifecycle state.
    pub state: PipelineState,
    /// Whether a persisted snapshot exists on disk.
    pub index_exists: bool,
    /// Records in the loaded index.
    pub indexed_chunks: usize,
    /// Embedding model of the loaded index, when any.
    pub embedding_model: Option<String>,
    /// Build timestamp of the loaded index, when any.
    pub built_at: Option<String>,
}

/// Summary of a successful index run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexOutcome {
    /// Documents that contributed at least one page.
    pub documents: usize,
    /// Pages loaded.
    pub pages: usize,
    /// Chunks embedded and persisted.
    pub chunk_count: usize,
    /// Embedding dimension of the new index.
    pub dimension: usize,
}

/// Retrieved passage returned alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSnippet {
    /// Leading characters of the passage.
    pub text_preview: String,
    /// Document and pages the passage came from.
    pub provenance: Provenance,
    /// Similarity score of the passage.
    pub score: f32,
}

/// Structured answer to a question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// Synthesized answer, or an explanation when generation failed.
    pub answer: String,
    /// Retrieved passages, most similar first.
    pub sources: Vec<SourceSnippet>,
    /// Language-model failure, when the answer is degraded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
