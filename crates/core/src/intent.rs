//! User intent — the closed classification driving retrieval and budgeting.
//!
//! Every chat turn is classified into exactly one intent before retrieval
//! begins. The set is closed on purpose: adding an intent is a compile-time
//! exhaustive-match exercise across the retriever, the budget allocator,
//! and the orchestrator's transition table.

use serde::{Deserialize, Serialize};

/// Classification of a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// The user is chasing a concrete failure — event evidence dominates.
    Debug,
    /// The user is asking about analytics/tracking behavior.
    Analytics,
    /// Anything else — explanatory or conversational, documentation dominates.
    #[default]
    General,
}

impl Intent {
    /// All members of the closed set, in classifier-prompt order.
    pub const ALL: [Intent; 3] = [Intent::Debug, Intent::Analytics, Intent::General];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Debug => "debug",
            Intent::Analytics => "analytics",
            Intent::General => "general",
        }
    }

    /// Parse a classifier answer. Returns `None` for anything outside the
    /// closed set — callers fall back to [`Intent::General`].
    pub fn parse(s: &str) -> Option<Intent> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Some(Intent::Debug),
            "analytics" => Some(Intent::Analytics),
            "general" => Some(Intent::General),
            _ => None,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_members() {
        assert_eq!(Intent::parse("debug"), Some(Intent::Debug));
        assert_eq!(Intent::parse(" Analytics \n"), Some(Intent::Analytics));
        assert_eq!(Intent::parse("GENERAL"), Some(Intent::General));
    }

    #[test]
    fn parse_out_of_vocabulary_is_none() {
        assert_eq!(Intent::parse("maybe"), None);
        assert_eq!(Intent::parse(""), None);
    }

    #[test]
    fn default_is_general() {
        assert_eq!(Intent::default(), Intent::General);
    }

    #[test]
    fn display_matches_as_str() {
        for intent in Intent::ALL {
            assert_eq!(intent.to_string(), intent.as_str());
        }
    }
}
