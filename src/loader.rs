//! PDF discovery and per-page text extraction.
//!
//! The loader enumerates the direct children of a directory with a `.pdf` extension, extracts
//! each page with `lopdf`, and tags every page with its file name and 1-based page number. A
//! document that cannot be read is logged and skipped so one corrupt file never blocks the rest
//! of the batch.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

/// Extension recognised as a loadable document.
pub const PDF_EXTENSION: &str = "pdf";

/// Text extracted from one page of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// File name of the source document.
    pub source: String,
    /// 1-based page number within the document.
    pub page: u32,
    /// Extracted page text.
    pub text: String,
}

/// Reasons a single document could not be loaded.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File could not be read from disk.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Bytes were not a parseable PDF.
    #[error("failed to parse PDF: {0}")]
    Parse(String),
    /// Encrypted documents are not supported.
    #[error("document is encrypted")]
    Encrypted,
    /// Text extraction failed on a page.
    #[error("failed to extract text from page {page}: {message}")]
    Extract {
        /// Page that failed.
        page: u32,
        /// Extractor message.
        message: String,
    },
}

/// Source of pages for the indexing pipeline.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load every recognised document in `dir`, in file-name order then page order.
    ///
    /// A missing directory or one with no documents yields an empty vector.
    async fn load(&self, dir: &Path) -> Vec<Page>;
}

/// Loader reading `.pdf` files from a flat directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfDirectoryLoader;

impl PdfDirectoryLoader {
    /// Construct a loader.
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentLoader for PdfDirectoryLoader {
    async fn load(&self, dir: &Path) -> Vec<Page> {
        let dir = dir.to_path_buf();
        match tokio::task::spawn_blocking(move || load_directory(&dir)).await {
            Ok(pages) => pages,
            Err(error) => {
                tracing::error!(%error, "PDF loading task failed");
                Vec::new()
            }
        }
    }
}

/// Returns true when `path` has a `.pdf` extension, ignoring case.
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(PDF_EXTENSION))
}

/// List PDF files directly inside `dir`, sorted by file name.
pub fn discover_pdfs(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "Source directory missing");
        return Vec::new();
    }

    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(error) => {
                tracing::warn!(%error, "Skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_pdf(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

fn load_directory(dir: &Path) -> Vec<Page> {
    let mut pages = Vec::new();
    let files = discover_pdfs(dir);

    for path in &files {
        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        match std::fs::read(path)
            .map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            })
            .and_then(|bytes| extract_pages(&source, &bytes))
        {
            Ok(document_pages) => {
                tracing::debug!(source = %source, pages = document_pages.len(), "Loaded document");
                pages.extend(document_pages);
            }
            Err(error) => {
                tracing::warn!(source = %source, %error, "Skipping document that failed to load");
            }
        }
    }

    tracing::info!(
        dir = %dir.display(),
        documents = files.len(),
        pages = pages.len(),
        "Finished loading documents"
    );
    pages
}

/// Extract the non-empty pages of an in-memory PDF.
pub fn extract_pages(source: &str, bytes: &[u8]) -> Result<Vec<Page>, LoadError> {
    let document =
        lopdf::Document::load_mem(bytes).map_err(|error| LoadError::Parse(error.to_string()))?;
    if document.is_encrypted() {
        return Err(LoadError::Encrypted);
    }

    let mut pages = Vec::new();
    for page_number in document.get_pages().into_keys() {
        let text = document
            .extract_text(&[page_number])
            .map_err(|error| LoadError::Extract {
                page: page_number,
                message: error.to_string(),
            })?;
        let text = normalize_page_text(&text);
        if text.is_empty() {
            continue;
        }
        pages.push(Page {
            source: source.to_string(),
            page: page_number,
            text,
        });
    }
    Ok(pages)
}

/// Collapse runs of blank lines and strip trailing whitespace from each line.
fn normalize_page_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out.trim().to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a minimal PDF with one page per entry, each page drawing its text in Helvetica.
    pub(crate) fn minimal_pdf(pages: &[&str]) -> Vec<u8> {
        let page_count = pages.len();
        let font_id = 3 + 2 * page_count;
        let mut objects: Vec<String> = Vec::new();
        objects.push("<< /Type /Catalog /Pages 2 0 R >>".into());
        let kids = (0..page_count)
            .map(|i| format!("{} 0 R", 3 + 2 * i))
            .collect::<Vec<_>>()
            .join(" ");
        objects.push(format!(
            "<< /Type /Pages /Kids [{kids}] /Count {page_count} >>"
        ));
        for (i, text) in pages.iter().enumerate() {
            let content_id = 4 + 2 * i;
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {content_id} 0 R /Resources << /Font << /F1 {font_id} 0 R >> >> >>"
            ));
            let stream = format!("BT /F1 12 Tf 72 700 Td ({text}) Tj ET");
            objects.push(format!(
                "<< /Length {} >>\nstream\n{stream}\nendstream",
                stream.len()
            ));
        }
        objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".into());

        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
        }
        let xref_start = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
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

    #[test]
    fn extracts_pages_in_order_with_one_based_numbers() {
        let bytes = minimal_pdf(&["first page phrase", "second page phrase"]);
        let pages = extract_pages("paper.pdf", &bytes).expect("pdf parses");

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page, 1);
        assert_eq!(pages[1].page, 2);
        assert!(pages[0].text.contains("first page phrase"));
        assert!(pages[1].text.contains("second page phrase"));
        assert!(pages.iter().all(|page| page.source == "paper.pdf"));
    }

    #[test]
    fn invalid_bytes_are_a_parse_error() {
        let err = extract_pages("broken.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
    }

    #[test]
    fn pdf_extension_check_ignores_case() {
        assert!(is_pdf(Path::new("a/Paper.PDF")));
        assert!(is_pdf(Path::new("b.pdf")));
        assert!(!is_pdf(Path::new("c.txt")));
        assert!(!is_pdf(Path::new("pdf")));
    }

    #[test]
    fn normalization_collapses_blank_runs() {
        assert_eq!(normalize_page_text("a  \n\n\n\nb\n"), "a\n\nb");
    }

    #[tokio::test]
    async fn loader_skips_corrupt_documents_and_non_pdfs() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("b.pdf"), minimal_pdf(&["bravo text"])).expect("write");
        std::fs::write(dir.path().join("a.pdf"), minimal_pdf(&["alpha text"])).expect("write");
        std::fs::write(dir.path().join("corrupt.pdf"), b"%PDF-1.4 garbage").expect("write");
        std::fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

        let pages = PdfDirectoryLoader::new().load(dir.path()).await;

        let sources: Vec<_> = pages.iter().map(|page| page.source.as_str()).collect();
        assert_eq!(sources, vec!["a.pdf", "b.pdf"]);
        assert!(pages[0].text.contains("alpha text"));
    }

    #[tokio::test]
    async fn missing_directory_yields_no_pages() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pages = PdfDirectoryLoader::new()
            .load(&dir.path().join("does-not-exist"))
            .await;
        assert!(pages.is_empty());
    }
}
