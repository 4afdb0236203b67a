//! Intent classification — one model call, never fatal.
//!
//! The classifier maps a user message onto the closed [`Intent`] set with a
//! single completion instructed to answer in exactly one word. Anything
//! that goes wrong — an out-of-vocabulary answer, a transport error — falls
//! back to [`Intent::General`]. There is no retry loop: the fallback IS the
//! failure path.

use tracing::{debug, warn};

use tracepilot_core::intent::Intent;
use tracepilot_core::model::{CompletionRequest, LanguageModel};

/// Classify a user message into an intent.
pub async fn classify_intent(
    model: &dyn LanguageModel,
    model_name: &str,
    message: &str,
) -> Intent {
    let prompt = format!(
        "Classify the intent of a question asked about a mobile SDK debugging session.\n\
         Answer with exactly one word from this list:\n\
         - debug: the user is investigating a failure, crash, or unexpected behavior\n\
         - analytics: the user is asking about analytics or tracking behavior\n\
         - general: anything else, including questions about concepts or documentation\n\n\
         Question: {message}\n\n\
         Answer:"
    );

    let request = CompletionRequest {
        model: model_name.to_string(),
        prompt,
        temperature: 0.0,
        max_tokens: Some(8),
    };

    match model.complete(request).await {
        Ok(response) => match Intent::parse(&response.text) {
            Some(intent) => {
                debug!(%intent, "Intent classified");
                intent
            }
            None => {
                debug!(raw = %response.text.trim(), "Classifier answered outside the intent set, defaulting to general");
                Intent::General
            }
        },
        Err(e) => {
            warn!(error = %e, "Intent classification failed, defaulting to general");
            Intent::General
        }
    }
}
