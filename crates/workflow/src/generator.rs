//! Response generation — one prompt, one model call, always a string.
//!
//! The final prompt is concatenated in a fixed order: system prompt,
//! documentation context, event context, an error-count annotation for
//! debug turns, conversation history (or an explicit empty marker), then
//! the user's message. Generation failure is recovered locally with a
//! fixed fallback — the terminal node of the workflow must always yield
//! *some* response.

use tracing::{info, warn};

use tracepilot_core::intent::Intent;
use tracepilot_core::model::{CompletionRequest, LanguageModel, Usage};

use crate::token::estimate_tokens;

/// The assistant's domain, used when no override is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are TracePilot, a debugging assistant for mobile \
SDK telemetry sessions. You answer questions about captured SDK events, network hits, and \
configuration using the session evidence and documentation provided below. Ground every claim \
in that context; when the context doesn't contain the answer, say so instead of guessing.";

/// Returned when the model call fails.
pub const FALLBACK_RESPONSE: &str = "I wasn't able to generate a response for this question. \
The session data is still intact — please try asking again.";

/// Marker used when a session has no prior turns.
const EMPTY_HISTORY_MARKER: &str = "(no previous messages)";

/// The generator's outcome.
#[derive(Debug, Clone)]
pub struct GeneratedResponse {
    /// The response text (model output or [`FALLBACK_RESPONSE`]).
    pub text: String,
    /// Whether the fallback was used.
    pub fallback: bool,
    /// Estimated prompt size in tokens.
    pub prompt_tokens: usize,
    /// Actual usage when the backend reported it.
    pub usage: Option<Usage>,
}

/// Assemble the final prompt.
pub fn build_prompt(
    system_prompt: &str,
    knowledge_context: &str,
    event_context: &str,
    intent: Intent,
    error_count: Option<usize>,
    history_context: &str,
    user_message: &str,
) -> String {
    let mut prompt = String::from(system_prompt);

    if !knowledge_context.is_empty() {
        prompt.push_str("\n\n[Documentation]\n");
        prompt.push_str(knowledge_context);
    }

    if !event_context.is_empty() {
        prompt.push_str("\n\n[Session Events]\n");
        prompt.push_str(event_context);
    }

    if intent == Intent::Debug {
        if let Some(count) = error_count.filter(|&c| c > 0) {
            prompt.push_str(&format!(
                "\n\nNote: {count} error event(s) detected in this session."
            ));
        }
    }

    prompt.push_str("\n\n[Conversation]\n");
    if history_context.is_empty() {
        prompt.push_str(EMPTY_HISTORY_MARKER);
        prompt.push('\n');
    } else {
        prompt.push_str(history_context);
    }

    prompt.push_str(&format!("\nUser: {user_message}\nAssistant:"));
    prompt
}

/// Run the single generation call. Model failure yields the fallback.
pub async fn generate(
    model: &dyn LanguageModel,
    model_name: &str,
    temperature: f32,
    max_tokens: u32,
    prompt: String,
) -> GeneratedResponse {
    let prompt_tokens = estimate_tokens(&prompt);

    let request = CompletionRequest {
        model: model_name.to_string(),
        prompt,
        temperature,
        max_tokens: Some(max_tokens),
    };

    match model.complete(request).await {
        Ok(response) => {
            info!(
                prompt_tokens,
                response_len = response.text.len(),
                "Response generated"
            );
            GeneratedResponse {
                text: response.text,
                fallback: false,
                prompt_tokens,
                usage: response.usage,
            }
        }
        Err(e) => {
            warn!(error = %e, "Generation failed, returning fallback response");
            GeneratedResponse {
                text: FALLBACK_RESPONSE.to_string(),
                fallback: true,
                prompt_tokens,
                usage: None,
            }
        }
    }
}
