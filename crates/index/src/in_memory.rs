//! In-memory semantic index — hybrid keyword + vector search.
//!
//! Keyword scoring always works. When an embedding backend is configured,
//! entries and queries are embedded and the keyword and vector rankings are
//! merged with reciprocal rank fusion. Embedding failures degrade the index
//! to keyword-only search; they never fail a query.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use tracepilot_core::error::IndexError;
use tracepilot_core::index::{IndexEntry, IndexQuery, SemanticIndex};
use tracepilot_core::model::{EmbeddingRequest, LanguageModel};

use crate::vector::{reciprocal_rank_fusion, vector_search};

/// RRF rank constant; standard value from the literature.
const RRF_K: u32 = 60;

/// An embedding-capable model plus the embedding model name to request.
#[derive(Clone)]
pub struct EmbeddingBackend {
    pub model: Arc<dyn LanguageModel>,
    pub embedding_model: String,
}

/// An in-memory index storing entries in a Vec behind an RwLock.
///
/// Serves as both the per-session event index and the shared knowledge
/// base. No persistence: lifetime equals process lifetime.
pub struct InMemoryIndex {
    name: String,
    entries: RwLock<Vec<IndexEntry>>,
    embedder: Option<EmbeddingBackend>,
}

impl InMemoryIndex {
    /// Create a keyword-only index.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(Vec::new()),
            embedder: None,
        }
    }

    /// Create a hybrid index backed by an embedding model.
    pub fn with_embedder(name: impl Into<String>, embedder: EmbeddingBackend) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(Vec::new()),
            embedder: Some(embedder),
        }
    }

    /// Embed a batch of texts. Returns `None` when no backend is configured
    /// or the call fails — the caller degrades to keyword search.
    async fn embed_texts(&self, texts: Vec<String>) -> Option<Vec<Vec<f32>>> {
        let backend = self.embedder.as_ref()?;
        let request = EmbeddingRequest {
            model: backend.embedding_model.clone(),
            inputs: texts,
        };
        match backend.model.embed(request).await {
            Ok(response) => Some(response.embeddings),
            Err(e) => {
                warn!(index = %self.name, error = %e, "Embedding failed, degrading to keyword search");
                None
            }
        }
    }

    /// Score entries by keyword overlap with the query.
    ///
    /// Terms shorter than three characters are noise and skipped. The score
    /// is occurrence count normalized by content length, so short focused
    /// entries outrank long rambling ones.
    fn keyword_search(entries: &[IndexEntry], query: &str, limit: usize) -> Vec<IndexEntry> {
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = query_lower
            .split_whitespace()
            .filter(|t| t.len() >= 3)
            .collect();
        if terms.is_empty() {
            return Vec::new();
        }

        let mut results: Vec<IndexEntry> = entries
            .iter()
            .filter_map(|entry| {
                let content = entry.content.to_lowercase();
                let occurrences: usize = terms.iter().map(|t| content.matches(t).count()).sum();
                if occurrences == 0 {
                    return None;
                }
                let mut e = entry.clone();
                e.score = occurrences as f32 / (content.len() as f32 / 100.0).max(1.0);
                Some(e)
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        results
    }
}

#[async_trait]
impl SemanticIndex for InMemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add(&self, mut entries: Vec<IndexEntry>) -> Result<usize, IndexError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let unembedded: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.embedding.is_none())
            .map(|(i, _)| i)
            .collect();

        if !unembedded.is_empty() {
            let texts: Vec<String> = unembedded
                .iter()
                .map(|&i| entries[i].content.clone())
                .collect();
            if let Some(embeddings) = self.embed_texts(texts).await {
                for (&i, embedding) in unembedded.iter().zip(embeddings) {
                    entries[i].embedding = Some(embedding);
                }
            }
        }

        let count = entries.len();
        self.entries.write().await.extend(entries);
        Ok(count)
    }

    async fn search(&self, query: IndexQuery) -> Result<Vec<IndexEntry>, IndexError> {
        if query.k == 0 {
            return Ok(Vec::new());
        }
        let entries = self.entries.read().await;

        let keyword = Self::keyword_search(&entries, &query.text, query.k);

        let merged = match self.embed_texts(vec![query.text.clone()]).await {
            Some(embeddings) if !embeddings.is_empty() => {
                let by_vector = vector_search(&entries, &embeddings[0], query.k, query.min_score);
                reciprocal_rank_fusion(&keyword, &by_vector, RRF_K, query.k)
            }
            _ => keyword,
        };

        Ok(merged
            .into_iter()
            .filter(|e| e.score >= query.min_score)
            .collect())
    }

    async fn count(&self) -> Result<usize, IndexError> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> Result<(), IndexError> {
        self.entries.write().await.clear();
        Ok(())
    }
}
