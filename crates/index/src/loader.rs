//! Knowledge base loading — files and directories into a semantic index.
//!
//! Supports plain text, markdown, and PDF (text extraction via `lopdf`).
//! Unreadable files are logged and skipped; a bad document must never stop
//! the rest of a directory from loading.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use tracepilot_core::error::IndexError;
use tracepilot_core::index::{EntryMetadata, IndexEntry, SemanticIndex};

use crate::chunk::chunk_text;

/// Outcome of a directory load.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadStats {
    /// Files successfully ingested
    pub files: usize,
    /// Total chunks added to the index
    pub chunks: usize,
    /// Files skipped (unreadable or empty)
    pub skipped: usize,
}

/// Chunk a document and add it to the index. Returns the chunk count.
pub async fn ingest_document(
    index: &dyn SemanticIndex,
    title: &str,
    source: &str,
    content: &str,
    chunk_tokens: usize,
    overlap_tokens: usize,
) -> Result<usize, IndexError> {
    let chunks = chunk_text(content, chunk_tokens, overlap_tokens);
    if chunks.is_empty() {
        return Ok(0);
    }

    let entries: Vec<IndexEntry> = chunks
        .into_iter()
        .map(|chunk| IndexEntry {
            id: Uuid::new_v4().to_string(),
            content: chunk,
            metadata: EntryMetadata {
                title: Some(title.to_string()),
                source: Some(source.to_string()),
                ..Default::default()
            },
            created_at: Utc::now(),
            score: 0.0,
            embedding: None,
        })
        .collect();

    index.add(entries).await
}

/// Recursively load every supported document under `dir` into the index.
pub async fn load_dir(
    index: &dyn SemanticIndex,
    dir: &Path,
    chunk_tokens: usize,
    overlap_tokens: usize,
) -> Result<LoadStats, IndexError> {
    let mut files = Vec::new();
    collect_files(dir, &mut files);
    files.sort();

    let mut stats = LoadStats::default();
    for path in files {
        let text = match extract_text(&path) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!(path = %path.display(), "Document is empty, skipping");
                stats.skipped += 1;
                continue;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read document, skipping");
                stats.skipped += 1;
                continue;
            }
        };

        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".into());
        let added = ingest_document(
            index,
            &title,
            &path.display().to_string(),
            &text,
            chunk_tokens,
            overlap_tokens,
        )
        .await?;

        stats.files += 1;
        stats.chunks += added;
    }

    info!(
        dir = %dir.display(),
        files = stats.files,
        chunks = stats.chunks,
        skipped = stats.skipped,
        "Knowledge base directory loaded"
    );
    Ok(stats)
}

/// Collect supported files under `dir`, recursing into subdirectories.
fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        warn!(dir = %dir.display(), "Cannot read directory");
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out);
        } else if is_supported(&path) {
            out.push(path);
        }
    }
}

fn is_supported(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("md" | "txt" | "pdf")
    )
}

/// Extract the text content of a document file.
pub fn extract_text(path: &Path) -> Result<String, IndexError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("pdf") => extract_pdf_text(path),
        _ => std::fs::read_to_string(path)
            .map_err(|e| IndexError::Storage(format!("{}: {e}", path.display()))),
    }
}

fn extract_pdf_text(path: &Path) -> Result<String, IndexError> {
    let doc = lopdf::Document::load(path)
        .map_err(|e| IndexError::Storage(format!("{}: {e}", path.display())))?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    doc.extract_text(&pages)
        .map_err(|e| IndexError::Storage(format!("{}: {e}", path.display())))
}
