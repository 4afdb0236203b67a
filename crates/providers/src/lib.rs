//! Language model backends for TracePilot.
//!
//! Two implementations of the [`tracepilot_core::LanguageModel`] trait:
//!
//! - [`OpenAiCompatModel`] — any OpenAI-compatible `/chat/completions`
//!   endpoint (OpenAI, OpenRouter, Ollama, vLLM, …), with embeddings
//! - [`AnthropicModel`] — Anthropic's native Messages API
//!
//! [`router::build_default_model`] resolves the configured backend.

pub mod anthropic;
pub mod openai_compat;
pub mod router;

pub use anthropic::AnthropicModel;
pub use openai_compat::OpenAiCompatModel;
pub use router::build_default_model;
