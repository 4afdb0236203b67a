//! Event formatting — fitting retrieved event blocks into a token budget.
//!
//! Events arrive pre-rendered (the session store indexes
//! `TelemetryEvent::render()` output), so formatting here is purely about
//! budget fit: a block that fits its share passes through unchanged, one
//! that doesn't is truncated, and aggregation stops on whole-unit
//! boundaries — an event is either in the prompt or it isn't.

use tracepilot_core::index::IndexEntry;

use crate::token::{estimate_tokens, truncate_to_tokens};

/// Fit one pre-rendered event block into `budget_tokens`.
pub fn format_event(content: &str, budget_tokens: usize) -> String {
    truncate_to_tokens(content, budget_tokens)
}

/// Outcome of formatting a batch of events against an aggregate slice.
#[derive(Debug, Clone)]
pub struct EventBatch {
    /// Formatted blocks, in retrieval rank order.
    pub blocks: Vec<String>,
    /// Events offered by retrieval.
    pub offered: usize,
    /// Events actually included before the slice ran out.
    pub included: usize,
    /// Realized token total across included blocks.
    pub tokens: usize,
}

/// Format up to `slice_budget` tokens worth of events.
///
/// The slice is divided evenly: each event gets `slice / max(1, count)`
/// tokens and is individually truncated to that share. Accumulation then
/// runs in rank order and stops the moment the running total would exceed
/// the slice — included events are never cut at the aggregate level, only
/// at their own per-event cap.
pub fn format_event_batch(events: &[IndexEntry], slice_budget: usize) -> EventBatch {
    let offered = events.len();
    if offered == 0 || slice_budget == 0 {
        return EventBatch {
            blocks: Vec::new(),
            offered,
            included: 0,
            tokens: 0,
        };
    }

    let per_event_budget = slice_budget / offered.max(1);
    let mut blocks = Vec::new();
    let mut tokens = 0;

    for event in events {
        let block = format_event(&event.content, per_event_budget);
        if block.is_empty() {
            continue;
        }
        let block_tokens = estimate_tokens(&block);
        if tokens + block_tokens > slice_budget {
            break;
        }
        tokens += block_tokens;
        blocks.push(block);
    }

    EventBatch {
        included: blocks.len(),
        blocks,
        offered,
        tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::entry;
    use crate::token::ELISION;

    #[test]
    fn fitting_event_passes_through() {
        assert_eq!(format_event("short block", 100), "short block");
    }

    #[test]
    fn oversized_event_is_truncated() {
        let content = "x".repeat(400);
        let out = format_event(&content, 20);
        assert!(estimate_tokens(&out) <= 20);
    }

    #[test]
    fn empty_batch() {
        let batch = format_event_batch(&[], 600);
        assert_eq!(batch.offered, 0);
        assert_eq!(batch.included, 0);
        assert_eq!(batch.tokens, 0);
    }

    #[test]
    fn zero_slice_includes_nothing() {
        let events = vec![entry("a", "some event"), entry("b", "another event")];
        let batch = format_event_batch(&events, 0);
        assert_eq!(batch.included, 0);
    }

    #[test]
    fn per_event_cap_is_slice_over_count() {
        // 20 events against a 600-token slice → 30 tokens each.
        let events: Vec<_> = (0..20)
            .map(|i| entry(&format!("e{i}"), &"event content ".repeat(40)))
            .collect();
        let batch = format_event_batch(&events, 600);

        assert_eq!(batch.offered, 20);
        assert!(batch.included > 0);
        for block in &batch.blocks {
            assert!(
                estimate_tokens(block) <= 30,
                "block exceeds its 30-token cap"
            );
        }
        assert!(batch.tokens <= 600);
    }

    #[test]
    fn aggregate_never_exceeds_slice() {
        // Uneven division: 100 / 7 = 14 tokens each. The realized total must
        // stay within the slice and every block within its own cap.
        let events: Vec<_> = (0..7)
            .map(|i| entry(&format!("e{i}"), &"abcd".repeat(25)))
            .collect();
        let batch = format_event_batch(&events, 100);

        assert!(batch.tokens <= 100);
        assert_eq!(batch.included, 7);
        for block in &batch.blocks {
            assert!(estimate_tokens(block) <= 14);
            assert!(block.contains(ELISION));
        }
    }

    #[test]
    fn small_batch_fits_untruncated() {
        let events = vec![entry("a", "first event"), entry("b", "second event")];
        let batch = format_event_batch(&events, 600);
        assert_eq!(batch.included, 2);
        assert_eq!(batch.blocks[0], "first event");
        assert_eq!(batch.blocks[1], "second event");
    }
}
