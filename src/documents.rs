//! Filesystem bookkeeping for the source document directory.
//!
//! Only flat `.pdf` file names are accepted. Uploads are written to a temp file and renamed so a
//! half-written upload is never picked up by the loader.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::loader::{discover_pdfs, is_pdf};

/// Errors raised while managing source documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// File name contains path components or is otherwise unusable.
    #[error("invalid document name: {0}")]
    InvalidName(String),
    /// File name does not carry a recognised document extension.
    #[error("only PDF documents are supported: {0}")]
    UnsupportedType(String),
    /// Requested document does not exist.
    #[error("document not found: {0}")]
    NotFound(String),
    /// Filesystem operation failed.
    #[error("document storage failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Listing entry for a stored document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentInfo {
    /// File name within the source directory.
    pub filename: String,
    /// Size on disk in bytes.
    pub size_bytes: u64,
    /// Size on disk in mebibytes, rounded to two decimals.
    pub size_mb: f64,
}

/// PDF directory supporting list, save, and delete.
#[derive(Debug, Clone)]
pub struct DocumentDirectory {
    dir: PathBuf,
}

impl DocumentDirectory {
    /// Manage documents stored in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory being managed.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// List stored PDFs sorted by file name. A missing directory lists as empty.
    pub async fn list(&self) -> Result<Vec<DocumentInfo>, DocumentError> {
        let dir = self.dir.clone();
        let paths = tokio::task::spawn_blocking(move || discover_pdfs(&dir))
            .await
            .map_err(|error| DocumentError::Io(std::io::Error::other(error)))?;

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let metadata = tokio::fs::metadata(&path).await?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            documents.push(info(filename, metadata.len()));
        }
        Ok(documents)
    }

    /// Store `bytes` under `filename`, replacing any existing file of that name.
    pub async fn save(&self, filename: &str, bytes: &[u8]) -> Result<DocumentInfo, DocumentError> {
        let target = self.resolve(filename)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let staging = self
            .dir
            .join(format!(".{filename}.upload-{}", uuid::Uuid::new_v4()));
        if let Err(error) = write_then_rename(&staging, &target, bytes).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(error.into());
        }

        tracing::info!(filename, size_bytes = bytes.len(), "Stored document");
        Ok(info(filename.to_string(), bytes.len() as u64))
    }

    /// Delete `filename`.
    pub async fn delete(&self, filename: &str) -> Result<(), DocumentError> {
        let target = self.resolve(filename)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => {
                tracing::info!(filename, "Deleted document");
                Ok(())
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(DocumentError::NotFound(filename.to_string()))
            }
            Err(error) => Err(error.into()),
        }
    }

    fn resolve(&self, filename: &str) -> Result<PathBuf, DocumentError> {
        let trimmed = filename.trim();
        let is_plain = !trimmed.is_empty()
            && !trimmed.starts_with('.')
            && !trimmed.contains(['/', '\\'])
            && !trimmed.contains("..")
            && !trimmed.chars().any(char::is_control);
        if !is_plain || trimmed != filename {
            return Err(DocumentError::InvalidName(filename.to_string()));
        }
        let path = self.dir.join(filename);
        if !is_pdf(&path) {
            return Err(DocumentError::UnsupportedType(filename.to_string()));
        }
        Ok(path)
    }
}

async fn write_then_rename(staging: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(staging, bytes).await?;
    tokio::fs::rename(staging, target).await
}

fn info(filename: String, size_bytes: u64) -> DocumentInfo {
    let size_mb = (size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;
    DocumentInfo {
        filename,
        size_bytes,
        size_mb,
    }
}
