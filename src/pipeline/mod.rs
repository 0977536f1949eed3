//! Question-answering pipeline: chunking, embedding, indexing, and answer orchestration.

pub mod chunking;
mod service;
pub mod types;

pub use chunking::{Chunk, Provenance};
pub use service::{PipelineApi, PipelineComponents, PipelineSettings, RagPipeline};
pub use types::{
    ChunkingError, IndexError, IndexOutcome, PipelineState, PipelineStatus, QueryError,
    QueryResult, SourceSnippet,
};
