//! Context-orchestration workflow — the core of TracePilot.
//!
//! A fixed pipeline turns one user message into one bounded, grounded
//! response:
//!
//! ```text
//! classify intent → retrieve (events ∥ knowledge) → [analyze errors]
//!                → allocate budget & format → generate
//! ```
//!
//! | Stage | Module | Contract |
//! |-------|--------|----------|
//! | Token estimation | `token` | char heuristic, prefix+suffix truncation |
//! | Intent | `intent` | closed set, fallback to `general`, never fatal |
//! | Retrieval | `retriever` | two concurrent searches, per-source degradation |
//! | Budgeting | `formatter` | intent-split slices, deterministic, pure |
//! | Event fitting | `events` | per-event caps, whole-unit inclusion |
//! | Generation | `generator` | one model call, fixed fallback |
//! | Sequencing | `orchestrator` | explicit node transition table |
//!
//! # Determinism
//!
//! Formatting is deterministic: identical inputs always produce identical
//! context strings. No random or time-dependent logic runs between
//! retrieval and generation.

pub mod events;
pub mod formatter;
pub mod generator;
pub mod intent;
pub mod orchestrator;
pub mod retriever;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use events::{format_event, format_event_batch, EventBatch};
pub use formatter::{format_context, split_for, FormattedContext, SliceStats};
pub use generator::{build_prompt, generate, GeneratedResponse, FALLBACK_RESPONSE};
pub use intent::classify_intent;
pub use orchestrator::{
    next_node, ChatMetadata, ChatOutcome, Orchestrator, StateUpdate, WorkflowConfig,
    WorkflowNode, WorkflowState,
};
pub use retriever::{retrieve, wants_knowledge, RetrievedContext};
