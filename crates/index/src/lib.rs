//! Semantic index implementations and knowledge base loading.
//!
//! The in-memory index serves both roles the workflow needs: the private
//! per-session event index and the shared documentation knowledge base.
//! Search is hybrid — keyword scoring always works, vector similarity is
//! layered on when an embedding backend is configured, and the two rankings
//! are merged with reciprocal rank fusion.

pub mod chunk;
pub mod in_memory;
pub mod loader;
pub mod vector;

pub use chunk::chunk_text;
pub use in_memory::{EmbeddingBackend, InMemoryIndex};
pub use loader::{ingest_document, load_dir, LoadStats};
