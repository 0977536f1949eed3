//! Deterministic collaborators shared by the integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docqa::{
    documents::DocumentDirectory,
    embedding::{EmbeddingClient, EmbeddingClientError},
    generation::{GenerationClient, GenerationClientError, GenerationRequest},
    index::LocalVectorStore,
    loader::{DocumentLoader, Page, PdfDirectoryLoader},
    pipeline::{PipelineComponents, PipelineSettings, RagPipeline},
    synthesis::AnswerSynthesizer,
};

pub const VOCABULARY: [&str; 8] = [
    "attention",
    "transformer",
    "residual",
    "image",
    "diffusion",
    "language",
    "contrastive",
    "alpha",
];

pub fn page(source: &str, page: u32, text: &str) -> Page {
    Page {
        source: source.into(),
        page,
        text: text.into(),
    }
}

/// Loader returning a mutable in-memory page list.
#[derive(Clone, Default)]
pub struct StubLoader {
    pub pages: Arc<Mutex<Vec<Page>>>,
    pub dirs: Arc<Mutex<Vec<PathBuf>>>,
}

impl StubLoader {
    pub fn with_pages(pages: Vec<Page>) -> Self {
        let loader = Self::default();
        loader.set_pages(pages);
        loader
    }

    pub fn set_pages(&self, pages: Vec<Page>) {
        *self.pages.lock().expect("pages lock") = pages;
    }
}

#[async_trait]
impl DocumentLoader for StubLoader {
    async fn load(&self, dir: &Path) -> Vec<Page> {
        self.dirs.lock().expect("dirs lock").push(dir.to_path_buf());
        self.pages.lock().expect("pages lock").clone()
    }
}

/// Embeds texts as keyword counts over [`VOCABULARY`].
#[derive(Clone, Default)]
pub struct KeywordEmbedder {
    pub calls: Arc<AtomicUsize>,
    pub fail: Arc<AtomicBool>,
}

impl KeywordEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn embed(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; VOCABULARY.len()];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .map(str::to_lowercase)
        {
            if let Some(slot) = VOCABULARY.iter().position(|word| *word == token) {
                vector[slot] += 1.0;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingClient for KeywordEmbedder {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding backend offline".into(),
            ));
        }
        Ok(texts.iter().map(|text| Self::embed(text)).collect())
    }

    fn model(&self) -> &str {
        "keyword-test"
    }
}

/// Generation client returning a fixed answer that names the requested model.
#[derive(Clone, Default)]
pub struct StubGenerator {
    pub calls: Arc<AtomicUsize>,
    pub fail: Arc<AtomicBool>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl StubGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().expect("prompts lock").last().cloned()
    }
}

#[async_trait]
impl GenerationClient for StubGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(request.prompt.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(GenerationClientError::ProviderUnavailable(
                "model not loaded".into(),
            ));
        }
        Ok(format!("  Grounded answer from {} [1]  ", request.model))
    }
}

/// A pipeline wired to stubs plus real on-disk index and document stores.
pub struct Harness {
    pub root: tempfile::TempDir,
    pub loader: StubLoader,
    pub embedder: KeywordEmbedder,
    pub generator: StubGenerator,
}

impl Harness {
    pub fn new(pages: Vec<Page>) -> Self {
        Self {
            root: tempfile::tempdir().expect("tempdir"),
            loader: StubLoader::with_pages(pages),
            embedder: KeywordEmbedder::default(),
            generator: StubGenerator::default(),
        }
    }

    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            source_dir: self.root.path().join("pdfs"),
            chunk_size: 200,
            chunk_overlap: 20,
            top_k: 3,
            preview_chars: 40,
            min_score: 0.0,
            embedding_batch_size: 2,
        }
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.path().join("vector_index")
    }

    pub async fn pipeline(&self) -> RagPipeline {
        self.pipeline_with(self.settings()).await
    }

    pub async fn pipeline_with(&self, settings: PipelineSettings) -> RagPipeline {
        self.assemble(settings, Box::new(self.loader.clone())).await
    }

    /// Pipeline reading real PDFs from the source directory.
    pub async fn pdf_pipeline(&self) -> RagPipeline {
        self.assemble(self.settings(), Box::new(PdfDirectoryLoader::new()))
            .await
    }

    async fn assemble(
        &self,
        settings: PipelineSettings,
        loader: Box<dyn DocumentLoader>,
    ) -> RagPipeline {
        let components = PipelineComponents {
            loader,
            embedding_client: Box::new(self.embedder.clone()),
            store: Box::new(LocalVectorStore::new(self.index_dir())),
            synthesizer: AnswerSynthesizer::new(
                Box::new(self.generator.clone()),
                "stub-llm",
                0.3,
                None,
            ),
            documents: DocumentDirectory::new(settings.source_dir.clone()),
        };
        RagPipeline::new(settings, components).await
    }
}

pub fn corpus() -> Vec<Page> {
    vec![
        page(
            "attention.pdf",
            1,
            "The transformer relies entirely on attention. Multi-head attention lets the model attend to positions jointly.",
        ),
        page(
            "attention.pdf",
            2,
            "Language modelling results show the transformer trains faster than recurrent networks.",
        ),
        page(
            "resnet.pdf",
            1,
            "Residual learning eases training of deep image classifiers. Residual blocks add identity shortcuts.",
        ),
    ]
}

/// Build a minimal PDF with one Helvetica text line per page.
pub fn minimal_pdf(pages: &[&str]) -> Vec<u8> {
    let page_count = pages.len();
    let font_id = 3 + 2 * page_count;
    let kids = (0..page_count)
        .map(|i| format!("{} 0 R", 3 + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{kids}] /Count {page_count} >>"),
    ];
    for (i, text) in pages.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 {font_id} 0 R >> >> >>",
            4 + 2 * i
        ));
        let stream = format!("BT /F1 12 Tf 72 700 Td ({text}) Tj ET");
        objects.push(format!(
            "<< /Length {} >>\nstream\n{stream}\nendstream",
            stream.len()
        ));
    }
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".into());

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_start}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    out
}
