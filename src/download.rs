//! Built-in paper catalog and a streaming downloader that seeds the source directory.
//!
//! Each download streams into `<filename>.part` and is renamed into place only once the body has
//! been fully written, so an interrupted transfer never leaves a truncated PDF behind.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

const CATALOG: [(&str, &str, &str); 8] = [
    (
        "Attention Is All You Need (Transformer)",
        "https://arxiv.org/pdf/1706.03762.pdf",
        "attention_is_all_you_need.pdf",
    ),
    (
        "BERT: Pre-training of Deep Bidirectional Transformers",
        "https://arxiv.org/pdf/1810.04805.pdf",
        "bert_paper.pdf",
    ),
    (
        "GPT-3: Language Models are Few-Shot Learners",
        "https://arxiv.org/pdf/2005.14165.pdf",
        "gpt3_paper.pdf",
    ),
    (
        "ResNet: Deep Residual Learning for Image Recognition",
        "https://arxiv.org/pdf/1512.03385.pdf",
        "resnet_paper.pdf",
    ),
    (
        "Vision Transformer (ViT)",
        "https://arxiv.org/pdf/2010.11929.pdf",
        "vision_transformer.pdf",
    ),
    (
        "CLIP: Learning Transferable Visual Models",
        "https://arxiv.org/pdf/2103.00020.pdf",
        "clip_paper.pdf",
    ),
    (
        "Stable Diffusion: High-Resolution Image Synthesis",
        "https://arxiv.org/pdf/2112.10752.pdf",
        "stable_diffusion.pdf",
    ),
    (
        "LLaMA: Open and Efficient Foundation Language Models",
        "https://arxiv.org/pdf/2302.13971.pdf",
        "llama_paper.pdf",
    ),
];

/// A downloadable paper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paper {
    /// Human-readable title.
    pub name: String,
    /// Absolute download URL.
    pub url: String,
    /// File name written into the target directory.
    pub filename: String,
}

/// The built-in catalog, in display order (1-based in [`Selection`]).
pub fn catalog() -> Vec<Paper> {
    CATALOG
        .iter()
        .map(|&(name, url, filename)| Paper {
            name: name.into(),
            url: url.into(),
            filename: filename.into(),
        })
        .collect()
}

/// Which catalog entries to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every paper (`0`).
    All,
    /// 1-based catalog positions, deduplicated in input order.
    Indices(Vec<usize>),
}

impl Selection {
    /// Resolve the selection against `papers`.
    pub fn apply(&self, papers: &[Paper]) -> Result<Vec<Paper>, DownloadError> {
        match self {
            Self::All => Ok(papers.to_vec()),
            Self::Indices(indices) => indices
                .iter()
                .map(|&index| {
                    index
                        .checked_sub(1)
                        .and_then(|offset| papers.get(offset))
                        .cloned()
                        .ok_or_else(|| {
                            DownloadError::InvalidSelection(format!(
                                "{index} is not between 1 and {}",
                                papers.len()
                            ))
                        })
                })
                .collect(),
        }
    }
}

impl FromStr for Selection {
    type Err = DownloadError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed == "0" {
            return Ok(Self::All);
        }

        let mut indices = Vec::new();
        for part in trimmed.split(',') {
            let index: usize = part
                .trim()
                .parse()
                .map_err(|_| DownloadError::InvalidSelection(value.to_string()))?;
            if index == 0 {
                return Err(DownloadError::InvalidSelection(value.to_string()));
            }
            if !indices.contains(&index) {
                indices.push(index);
            }
        }
        Ok(Self::Indices(indices))
    }
}

/// Errors raised while downloading papers.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The `--select` argument could not be parsed or is out of range.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    /// HTTP client could not be constructed or the transfer failed.
    #[error("download request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },
    /// Writing the file failed.
    #[error("failed to write {path}: {source}")]
    Io {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Per-run summary, listing file names by outcome.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    /// Newly downloaded files.
    pub downloaded: Vec<String>,
    /// Files that already existed.
    pub skipped: Vec<String>,
    /// Files that failed, with the error message.
    pub failed: Vec<(String, String)>,
}

impl DownloadReport {
    /// Papers that are present on disk after the run.
    pub fn available(&self) -> usize {
        self.downloaded.len() + self.skipped.len()
    }
}

enum Fetched {
    Downloaded(u64),
    Skipped,
}

/// Streams papers into a directory.
pub struct Downloader {
    client: Client,
    dir: PathBuf,
}

impl Downloader {
    /// Create a downloader writing into `dir` with a per-request `timeout`.
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("docqa/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            dir: dir.into(),
        })
    }

    /// Target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fetch every paper in turn. Individual failures are recorded, never propagated.
    pub async fn download_all(&self, papers: &[Paper]) -> DownloadReport {
        let mut report = DownloadReport::default();
        for paper in papers {
            match self.fetch(paper).await {
                Ok(Fetched::Downloaded(bytes)) => {
                    tracing::info!(paper = %paper.name, filename = %paper.filename, bytes, "Downloaded paper");
                    report.downloaded.push(paper.filename.clone());
                }
                Ok(Fetched::Skipped) => {
                    tracing::info!(paper = %paper.name, "Already present; skipping");
                    report.skipped.push(paper.filename.clone());
                }
                Err(error) => {
                    tracing::warn!(paper = %paper.name, %error, "Download failed");
                    report
                        .failed
                        .push((paper.filename.clone(), error.to_string()));
                }
            }
        }
        report
    }

    async fn fetch(&self, paper: &Paper) -> Result<Fetched, DownloadError> {
        let target = self.dir.join(&paper.filename);
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return Ok(Fetched::Skipped);
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| DownloadError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let partial = self.dir.join(format!("{}.part", paper.filename));
        match self.stream_to(&paper.url, &partial).await {
            Ok(bytes) => {
                tokio::fs::rename(&partial, &target)
                    .await
                    .map_err(|source| DownloadError::Io {
                        path: target.clone(),
                        source,
                    })?;
                Ok(Fetched::Downloaded(bytes))
            }
            Err(error) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(error)
            }
        }
    }

    async fn stream_to(&self, url: &str, path: &Path) -> Result<u64, DownloadError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let io_error = |source| DownloadError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = tokio::fs::File::create(path).await.map_err(io_error)?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_error)?;
        Ok(written)
    }
}
