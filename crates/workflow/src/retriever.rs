//! Context retrieval — two semantic lookups, issued concurrently.
//!
//! The session's private event index and the shared knowledge base are
//! searched in parallel and joined before formatting proceeds; both results
//! must be available, in any order, before the formatter runs. Failure of
//! either source is recovered locally: that source contributes an empty
//! result set and the workflow continues, possibly with zero context.

use tracing::{debug, warn};

use tracepilot_config::RetrievalConfig;
use tracepilot_core::index::{IndexEntry, IndexQuery, SemanticIndex};
use tracepilot_core::intent::Intent;

/// Single-word cues suggesting an explanatory/definitional question.
const WORD_CUES: &[&str] = &["how", "explain", "documentation", "docs"];
/// Phrase cues checked by substring.
const PHRASE_CUES: &[&str] = &["what is", "what are", "what does", "difference between"];

/// The joined result of both retrieval calls.
#[derive(Debug, Default)]
pub struct RetrievedContext {
    /// Ranked event candidates from the session index.
    pub events: Vec<IndexEntry>,
    /// Ranked documentation candidates from the knowledge base.
    pub documents: Vec<IndexEntry>,
    /// Whether the knowledge base was queried at all (gate decision).
    pub knowledge_queried: bool,
    /// Error message when the event search failed.
    pub event_failure: Option<String>,
    /// Error message when the knowledge search failed.
    pub knowledge_failure: Option<String>,
}

/// Whether documentation retrieval should run for this turn.
///
/// This is a cheap lexical gate, not a classifier: it exists to avoid
/// paying retrieval and prompt-budget cost for documentation context when
/// it's unlikely to be used. General intent always qualifies.
pub fn wants_knowledge(intent: Intent, message: &str) -> bool {
    if intent == Intent::General {
        return true;
    }
    let lowered = message.to_lowercase();
    if PHRASE_CUES.iter().any(|cue| lowered.contains(cue)) {
        return true;
    }
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| WORD_CUES.contains(&word))
}

/// Event retrieval breadth for an intent. Debugging needs broader evidence.
fn event_breadth(intent: Intent, config: &RetrievalConfig) -> usize {
    match intent {
        Intent::Debug => config.debug_event_k,
        Intent::Analytics | Intent::General => config.default_event_k,
    }
}

/// Run both retrievals concurrently and join.
pub async fn retrieve(
    event_index: &dyn SemanticIndex,
    knowledge_base: &dyn SemanticIndex,
    config: &RetrievalConfig,
    intent: Intent,
    message: &str,
) -> RetrievedContext {
    let knowledge_queried = wants_knowledge(intent, message);
    let event_k = event_breadth(intent, config);

    let event_search = async {
        match event_index
            .search(IndexQuery::new(message, event_k))
            .await
        {
            Ok(results) => (results, None),
            Err(e) => {
                warn!(error = %e, "Event retrieval failed, continuing without event context");
                (Vec::new(), Some(e.to_string()))
            }
        }
    };

    let knowledge_search = async {
        if !knowledge_queried {
            return (Vec::new(), None);
        }
        match knowledge_base
            .search(IndexQuery::new(message, config.document_k))
            .await
        {
            Ok(results) => (results, None),
            Err(e) => {
                warn!(error = %e, "Knowledge retrieval failed, continuing without documentation context");
                (Vec::new(), Some(e.to_string()))
            }
        }
    };

    let ((events, event_failure), (documents, knowledge_failure)) =
        tokio::join!(event_search, knowledge_search);

    debug!(
        %intent,
        events = events.len(),
        documents = documents.len(),
        knowledge_queried,
        "Context retrieved"
    );

    RetrievedContext {
        events,
        documents,
        knowledge_queried,
        event_failure,
        knowledge_failure,
    }
}
