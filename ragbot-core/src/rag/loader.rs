//! Reading source documents from disk.
//!
//! This module provides functionality to:
//! - Recursively collect documents from a directory
//! - Extract text from plain-text and PDF files
//! - Filter files by extension and exclude patterns

use super::types::Document;
use crate::config::StorageConfig;
use crate::patterns::{has_extension, should_exclude};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Errors that can occur while loading a single file.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// An I/O error occurred while reading files or directories.
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF extraction failed for {path}: {message}")]
    Pdf { path: PathBuf, message: String },

    #[error("Unsupported file type: {0}")]
    Unsupported(PathBuf),
}

/// Result type for loading operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// PDF text uses form feeds between pages.
const PAGE_BREAK: char = '\x0C';

/// Loads `.txt`/`.md` and `.pdf` files into [`Document`]s.
///
/// Text files become one document with a `source` metadata entry. PDFs
/// become one document per non-empty page with `source` and a 0-based
/// `page` entry.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    extensions: Vec<String>,
    exclude_patterns: Vec<String>,
}

impl DocumentLoader {
    pub fn new(extensions: Vec<String>, exclude_patterns: Vec<String>) -> Self {
        Self {
            extensions,
            exclude_patterns,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.extensions.clone(), config.exclude_patterns.clone())
    }

    /// Recursively loads every matching file under `dir`.
    ///
    /// Files are visited in file-name order so repeated runs produce the same
    /// document sequence. Unreadable files are logged and skipped. A missing
    /// directory yields no documents.
    ///
    /// This does blocking I/O and PDF parsing; async callers should run it
    /// on a blocking thread.
    pub fn load_dir(&self, dir: &Path) -> Vec<Document> {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "Documents directory does not exist");
            return Vec::new();
        }

        let mut documents = Vec::new();
        let walker = WalkDir::new(dir).sort_by_file_name().into_iter();

        for entry in walker.filter_entry(|e| !self.is_excluded(dir, e.path())) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() || !has_extension(path, &self.extensions) {
                continue;
            }

            match self.load_file(path) {
                Ok(mut docs) => {
                    debug!(file = %path.display(), documents = docs.len(), "Loaded file");
                    documents.append(&mut docs);
                }
                Err(e) => warn!(error = %e, "Skipping file"),
            }
        }

        info!(dir = %dir.display(), documents = documents.len(), "Loaded documents");
        documents
    }

    /// Loads one file, dispatching on its extension.
    pub fn load_file(&self, path: &Path) -> Result<Vec<Document>> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => load_pdf(path),
            "txt" | "text" | "md" | "markdown" => load_text(path),
            _ => Err(LoaderError::Unsupported(path.to_path_buf())),
        }
    }

    fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        path.strip_prefix(root)
            .map(|relative| should_exclude(relative, &self.exclude_patterns))
            .unwrap_or(false)
    }
}

fn source_of(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn load_text(path: &Path) -> Result<Vec<Document>> {
    let content = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    Ok(vec![Document::new(content).with_metadata("source", source_of(path))])
}

fn load_pdf(path: &Path) -> Result<Vec<Document>> {
    let bytes = std::fs::read(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = pdf_extract::extract_text_from_mem(&bytes).map_err(|e| LoaderError::Pdf {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(split_pages(&text, &source_of(path)))
}

/// One document per non-empty page; pages keep their position in the file.
fn split_pages(text: &str, source: &str) -> Vec<Document> {
    text.split(PAGE_BREAK)
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(page, content)| {
            Document::new(content.trim())
                .with_metadata("source", source)
                .with_metadata("page", page)
        })
        .collect()
}
