//! Semantic index trait — black-box nearest-neighbor search over text.
//!
//! Two indexes exist at runtime: a private per-session event index and a
//! shared documentation knowledge base. Both are consumed through this one
//! trait; the workflow never sees how ranking is implemented.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::telemetry::EventCategory;

/// A single indexed entry. Search returns clones with `score` populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Unique ID for this entry
    pub id: String,

    /// The indexed text (rendered event block or documentation chunk)
    pub content: String,

    /// Typed metadata carried alongside the content
    #[serde(default)]
    pub metadata: EntryMetadata,

    /// When this entry was added
    pub created_at: DateTime<Utc>,

    /// Relevance score (set by search operations)
    #[serde(default)]
    pub score: f32,

    /// Optional embedding vector
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

/// Metadata attached to an index entry. Document entries populate
/// `title`/`source`; event entries populate the error/category/timestamp
/// trio. Unused fields stay at their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Document title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Document source (filename, URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Whether the underlying event carries an error signal
    #[serde(default)]
    pub is_error: bool,

    /// SDK-extension vs backend-service categorization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<EventCategory>,

    /// Capture timestamp of the underlying event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A search request against an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexQuery {
    /// The search text
    pub text: String,

    /// Maximum number of results
    #[serde(default = "default_k")]
    pub k: usize,

    /// Minimum relevance score threshold
    #[serde(default)]
    pub min_score: f32,
}

fn default_k() -> usize {
    5
}

impl IndexQuery {
    /// A query with default breadth and no score floor.
    pub fn new(text: impl Into<String>, k: usize) -> Self {
        Self {
            text: text.into(),
            k,
            min_score: 0.0,
        }
    }
}

/// The semantic index trait.
///
/// Implementations: in-memory hybrid (keyword + vector), stubs for testing.
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// The index name (e.g., "events:sess_1", "knowledge_base").
    fn name(&self) -> &str;

    /// Add entries to the index. Returns how many were stored.
    async fn add(&self, entries: Vec<IndexEntry>) -> std::result::Result<usize, IndexError>;

    /// Search for the entries nearest to the query text, ranked by
    /// descending relevance.
    async fn search(&self, query: IndexQuery) -> std::result::Result<Vec<IndexEntry>, IndexError>;

    /// Total entry count.
    async fn count(&self) -> std::result::Result<usize, IndexError>;

    /// Remove all entries.
    async fn clear(&self) -> std::result::Result<(), IndexError>;
}
