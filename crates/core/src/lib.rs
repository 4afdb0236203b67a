//! # TracePilot Core
//!
//! Domain types, traits, and error definitions for the TracePilot telemetry
//! debugging assistant. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod index;
pub mod intent;
pub mod message;
pub mod model;
pub mod session;
pub mod telemetry;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use index::{EntryMetadata, IndexEntry, IndexQuery, SemanticIndex};
pub use intent::Intent;
pub use message::{ChatMessage, Role, SessionId};
pub use model::{CompletionRequest, CompletionResponse, LanguageModel, Usage};
pub use session::{Session, SessionStore, UploadStats};
pub use telemetry::{EventCategory, TelemetryEvent};
