//! Pipeline orchestrator coordinating loading, chunking, embedding, indexing, and synthesis.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::{
    config::Config,
    documents::{DocumentDirectory, DocumentError, DocumentInfo},
    embedding::{EmbeddingClient, build_embedding_client},
    generation::build_generation_client,
    index::{IndexRecord, LocalVectorStore, ScoredChunk, VectorIndex, VectorStore},
    loader::{DocumentLoader, PdfDirectoryLoader},
    metrics::{MetricsSnapshot, PipelineMetrics},
    pipeline::{
        chunking::chunk_pages,
        types::{
            IndexError, IndexOutcome, PipelineState, PipelineStatus, QueryError, QueryResult,
            SourceSnippet,
        },
    },
    synthesis::AnswerSynthesizer,
};

/// Tunables fixed at construction time.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Default directory indexed when callers do not name one.
    pub source_dir: PathBuf,
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Passages retrieved per question.
    pub top_k: usize,
    /// Length of source previews.
    pub preview_chars: usize,
    /// Passages scoring at or below this are not used as context.
    pub min_score: f32,
    /// Texts per embedding request while indexing.
    pub embedding_batch_size: usize,
}

impl PipelineSettings {
    /// Extract pipeline settings from the runtime configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_dir: config.source_dir.clone(),
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            top_k: config.top_k,
            preview_chars: config.preview_chars,
            min_score: config.min_score,
            embedding_batch_size: config.embedding_batch_size.max(1),
        }
    }
}

/// Collaborators injected into [`RagPipeline::new`].
pub struct PipelineComponents {
    /// Produces pages from a source directory.
    pub loader: Box<dyn DocumentLoader>,
    /// Embeds chunks and questions.
    pub embedding_client: Box<dyn EmbeddingClient>,
    /// Persists and reloads index generations.
    pub store: Box<dyn VectorStore>,
    /// Turns retrieved passages into answers.
    pub synthesizer: AnswerSynthesizer,
    /// Source document bookkeeping.
    pub documents: DocumentDirectory,
}

/// Abstraction over the pipeline used by external surfaces (HTTP, MCP).
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Report lifecycle state and index details.
    async fn status(&self) -> PipelineStatus;

    /// Rebuild the index from `source_dir`, or from the configured directory when `None`.
    async fn index(&self, source_dir: Option<PathBuf>) -> Result<IndexOutcome, IndexError>;

    /// Answer a question from the current index.
    async fn query(&self, question: &str) -> Result<QueryResult, QueryError>;

    /// List stored source documents.
    async fn list_documents(&self) -> Result<Vec<DocumentInfo>, DocumentError>;

    /// Store a source document.
    async fn save_document(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<DocumentInfo, DocumentError>;

    /// Delete a source document. The loaded index is unaffected.
    async fn delete_document(&self, filename: &str) -> Result<(), DocumentError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;

    /// Settings the pipeline was built with.
    fn settings(&self) -> &PipelineSettings;
}

/// Retrieval-augmented question answering over a directory of PDFs.
///
/// The pipeline is `UNINDEXED` until an index generation is installed, either by the startup
/// probe in [`RagPipeline::new`] or by a successful [`RagPipeline::index`]. Index runs are
/// serialized; queries read an `Arc` snapshot of the current generation and never block on a
/// running index build.
pub struct RagPipeline {
    settings: PipelineSettings,
    loader: Box<dyn DocumentLoader>,
    embedding_client: Box<dyn EmbeddingClient>,
    store: Box<dyn VectorStore>,
    synthesizer: AnswerSynthesizer,
    documents: DocumentDirectory,
    metrics: Arc<PipelineMetrics>,
    current: RwLock<Option<Arc<VectorIndex>>>,
    index_lock: Mutex<()>,
}

impl RagPipeline {
    /// Build a pipeline from injected components, probing the store once for a persisted index.
    pub async fn new(settings: PipelineSettings, components: PipelineComponents) -> Self {
        let PipelineComponents {
            loader,
            embedding_client,
            store,
            synthesizer,
            documents,
        } = components;

        let current = match store.load().await {
            Ok(Some(index)) => {
                tracing::info!(records = index.len(), "Pipeline ready with persisted index");
                Some(index)
            }
            Ok(None) => {
                tracing::info!("No persisted index found; pipeline unindexed");
                None
            }
            Err(error) => {
                tracing::warn!(%error, "Persisted index could not be loaded; pipeline unindexed");
                None
            }
        };

        Self {
            settings,
            loader,
            embedding_client,
            store,
            synthesizer,
            documents,
            metrics: Arc::new(PipelineMetrics::new()),
            current: RwLock::new(current),
            index_lock: Mutex::new(()),
        }
    }

    /// Build the production pipeline described by `config`.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedding_client =
            build_embedding_client(config).context("failed to initialize embedding client")?;
        let generation_client =
            build_generation_client(config).context("failed to initialize generation client")?;
        let synthesizer = AnswerSynthesizer::new(
            generation_client,
            config.generation_model.clone(),
            config.generation_temperature,
            config.answer_language.clone(),
        );

        let components = PipelineComponents {
            loader: Box::new(PdfDirectoryLoader::new()),
            embedding_client,
            store: Box::new(LocalVectorStore::new(config.index_dir.clone())),
            synthesizer,
            documents: DocumentDirectory::new(config.source_dir.clone()),
        };
        Ok(Self::new(PipelineSettings::from_config(config), components).await)
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> PipelineState {
        if self.current.read().await.is_some() {
            PipelineState::Ready
        } else {
            PipelineState::Unindexed
        }
    }

    async fn snapshot(&self) -> Option<Arc<VectorIndex>> {
        self.current.read().await.clone()
    }

    /// Load, chunk, embed, and persist every document, then swap in the new index.
    pub async fn index(&self, source_dir: Option<PathBuf>) -> Result<IndexOutcome, IndexError> {
        let _guard = self.index_lock.lock().await;
        let started = Instant::now();
        let dir = source_dir.unwrap_or_else(|| self.settings.source_dir.clone());
        tracing::info!(dir = %dir.display(), "Indexing documents");

        let pages = self.loader.load(&dir).await;
        if pages.is_empty() {
            tracing::warn!(dir = %dir.display(), "No documents to index");
            return Err(IndexError::NoDocumentsFound(dir.display().to_string()));
        }
        let documents = pages
            .iter()
            .map(|page| page.source.as_str())
            .collect::<BTreeSet<_>>()
            .len();

        let chunks = chunk_pages(
            &pages,
            self.settings.chunk_size,
            self.settings.chunk_overlap,
        )?;
        if chunks.is_empty() {
            return Err(IndexError::NoChunks);
        }
        tracing::debug!(
            documents,
            pages = pages.len(),
            chunk_count = chunks.len(),
            "Chunked documents"
        );

        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.settings.embedding_batch_size) {
            let texts = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = self.embedding_client.generate_embeddings(texts).await?;
            if vectors.len() != batch.len() {
                return Err(IndexError::EmbeddingCountMismatch {
                    expected: batch.len(),
                    actual: vectors.len(),
                });
            }
            embeddings.extend(vectors);
        }

        let chunk_count = chunks.len();
        let records = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexRecord {
                id: chunk.id,
                text: chunk.text,
                provenance: chunk.provenance,
                embedding,
            })
            .collect();

        let index = self
            .store
            .build(records, self.embedding_client.model())
            .await?;
        let dimension = index.dimension();
        *self.current.write().await = Some(index);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.metrics
            .record_index(documents as u64, chunk_count as u64, elapsed_ms);
        tracing::info!(
            documents,
            pages = pages.len(),
            chunk_count,
            dimension,
            elapsed_ms,
            "Index ready"
        );

        Ok(IndexOutcome {
            documents,
            pages: pages.len(),
            chunk_count,
            dimension,
        })
    }

    /// Answer `question` from the current index generation.
    pub async fn query(&self, question: &str) -> Result<QueryResult, QueryError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::EmptyQuestion);
        }
        let index = self.snapshot().await.ok_or(QueryError::NotReady)?;

        let mut vectors = self
            .embedding_client
            .generate_embeddings(vec![question.to_string()])
            .await?;
        let vector = vectors.pop().ok_or(QueryError::EmptyEmbedding)?;
        if vector.len() != index.dimension() {
            return Err(QueryError::DimensionMismatch {
                expected: index.dimension(),
                actual: vector.len(),
            });
        }

        let hits: Vec<ScoredChunk> = index
            .search(&vector, self.settings.top_k)
            .into_iter()
            .filter(|hit| hit.score > self.settings.min_score)
            .collect();
        let contexts: Vec<String> = hits.iter().map(|hit| hit.text.clone()).collect();
        let sources = hits
            .into_iter()
            .map(|hit| SourceSnippet {
                text_preview: preview(&hit.text, self.settings.preview_chars),
                provenance: hit.provenance,
                score: hit.score,
            })
            .collect::<Vec<_>>();

        let result = match self.synthesizer.synthesize(question, &contexts).await {
            Ok(answer) => QueryResult {
                answer,
                sources,
                error: None,
            },
            Err(error) => {
                tracing::warn!(%error, "Answer synthesis failed; returning degraded result");
                QueryResult {
                    answer: format!("Error processing question: {error}"),
                    sources,
                    error: Some(error.to_string()),
                }
            }
        };

        self.metrics.record_query(result.error.is_some());
        tracing::info!(
            sources = result.sources.len(),
            degraded = result.error.is_some(),
            "Answered question"
        );
        Ok(result)
    }

    /// Report lifecycle state and index details.
    pub async fn status(&self) -> PipelineStatus {
        let index = self.snapshot().await;
        PipelineStatus {
            state: if index.is_some() {
                PipelineState::Ready
            } else {
                PipelineState::Unindexed
            },
            index_exists: self.store.exists(),
            indexed_chunks: index.as_ref().map_or(0, |index| index.len()),
            embedding_model: index.as_ref().map(|index| index.model().to_string()),
            built_at: index.as_ref().map(|index| index.built_at().to_string()),
        }
    }
}

#[async_trait]
impl PipelineApi for RagPipeline {
    async fn status(&self) -> PipelineStatus {
        RagPipeline::status(self).await
    }

    async fn index(&self, source_dir: Option<PathBuf>) -> Result<IndexOutcome, IndexError> {
        RagPipeline::index(self, source_dir).await
    }

    async fn query(&self, question: &str) -> Result<QueryResult, QueryError> {
        RagPipeline::query(self, question).await
    }

    async fn list_documents(&self) -> Result<Vec<DocumentInfo>, DocumentError> {
        self.documents.list().await
    }

    async fn save_document(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<DocumentInfo, DocumentError> {
        self.documents.save(filename, &bytes).await
    }

    async fn delete_document(&self, filename: &str) -> Result<(), DocumentError> {
        self.documents.delete(filename).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn settings(&self) -> &PipelineSettings {
        &self.settings
    }
}

/// First `max_chars` characters of `text`, with `...` appended only when truncated.
fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
