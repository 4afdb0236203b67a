//! Shared test helpers for workflow tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use tracepilot_core::error::{IndexError, ModelError};
use tracepilot_core::index::{EntryMetadata, IndexEntry, IndexQuery, SemanticIndex};
use tracepilot_core::model::{
    CompletionRequest, CompletionResponse, LanguageModel, Usage,
};

/// Build a plain index entry with the given id and content.
pub fn entry(id: &str, content: &str) -> IndexEntry {
    IndexEntry {
        id: id.into(),
        content: content.into(),
        metadata: EntryMetadata::default(),
        created_at: Utc::now(),
        score: 0.0,
        embedding: None,
    }
}

/// Build an event entry flagged as an error.
pub fn error_entry(id: &str, content: &str) -> IndexEntry {
    let mut e = entry(id, content);
    e.metadata.is_error = true;
    e
}

/// A mock model that returns a sequence of scripted outcomes.
///
/// Each call to `complete` pops the next outcome. Panics if more calls are
/// made than outcomes provided.
pub struct ScriptedModel {
    outcomes: Mutex<Vec<Result<String, ModelError>>>,
    calls: Mutex<usize>,
}

impl ScriptedModel {
    pub fn new(outcomes: Vec<Result<String, ModelError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            calls: Mutex::new(0),
        }
    }

    /// A model that answers every call with the same text.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string()); 8])
    }

    /// Scripted answers in order: first call gets `first`, and so on.
    pub fn sequence(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    /// A model whose every call fails.
    pub fn failing() -> Self {
        Self::new(vec![
            Err(ModelError::Network("connection refused".into()));
            8
        ])
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ModelError> {
        let mut calls = self.calls.lock().unwrap();
        let mut outcomes = self.outcomes.lock().unwrap();

        if outcomes.is_empty() {
            panic!("ScriptedModel: no more outcomes (call #{})", *calls + 1);
        }

        *calls += 1;
        outcomes.remove(0).map(|text| CompletionResponse {
            text,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: request.model,
        })
    }
}

/// An index holding a fixed entry list; search returns the first `k`.
pub struct StaticIndex {
    name: String,
    entries: Vec<IndexEntry>,
}

impl StaticIndex {
    pub fn new(name: &str, entries: Vec<IndexEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }
}

#[async_trait]
impl SemanticIndex for StaticIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add(&self, _entries: Vec<IndexEntry>) -> Result<usize, IndexError> {
        Err(IndexError::Storage("static index is read-only".into()))
    }

    async fn search(&self, query: IndexQuery) -> Result<Vec<IndexEntry>, IndexError> {
        Ok(self.entries.iter().take(query.k).cloned().collect())
    }

    async fn count(&self) -> Result<usize, IndexError> {
        Ok(self.entries.len())
    }

    async fn clear(&self) -> Result<(), IndexError> {
        Ok(())
    }
}

/// An index whose every search fails.
pub struct FailingIndex;

#[async_trait]
impl SemanticIndex for FailingIndex {
    fn name(&self) -> &str {
        "failing"
    }

    async fn add(&self, _entries: Vec<IndexEntry>) -> Result<usize, IndexError> {
        Err(IndexError::Storage("down".into()))
    }

    async fn search(&self, _query: IndexQuery) -> Result<Vec<IndexEntry>, IndexError> {
        Err(IndexError::QueryFailed("index unavailable".into()))
    }

    async fn count(&self) -> Result<usize, IndexError> {
        Err(IndexError::QueryFailed("index unavailable".into()))
    }

    async fn clear(&self) -> Result<(), IndexError> {
        Ok(())
    }
}
