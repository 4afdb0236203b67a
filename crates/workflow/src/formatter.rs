//! Context formatting and budget allocation — the core algorithm.
//!
//! Deterministically converts unranked, unbounded retrieval results into
//! prompt-ready, strictly token-bounded text blocks. A fixed total budget
//! is carved up in three steps:
//!
//! 1. `available = total − systemReserve − estimate(userMessage) − responseReserve`
//!    (degenerate `available ≤ 0` allocates zero everywhere, never panics)
//! 2. `available` splits into event/doc/history slices by intent-dependent
//!    percentages — debugging weights raw evidence, explanatory questions
//!    weight documentation
//! 3. each slice fills independently: events through per-event caps, docs
//!    up to a fixed candidate cap, history newest-first then restored to
//!    chronological order so truncation always drops the oldest turns
//!
//! This module is pure given its inputs: no clocks, no I/O, no randomness.

use tracepilot_config::{BudgetConfig, SliceSplit};
use tracepilot_core::index::IndexEntry;
use tracepilot_core::intent::Intent;
use tracepilot_core::message::ChatMessage;

use crate::events::format_event_batch;
use crate::token::estimate_tokens;

/// Realized numbers for one budget slice.
#[derive(Debug, Clone, Copy, Default)]
pub struct SliceStats {
    /// Tokens allocated to this slice.
    pub budget: usize,
    /// Tokens actually consumed.
    pub tokens: usize,
    /// Items included.
    pub included: usize,
    /// Items offered by retrieval.
    pub offered: usize,
}

/// The formatted, bounded context for one chat turn.
#[derive(Debug, Clone, Default)]
pub struct FormattedContext {
    /// Event blocks joined for the prompt; empty when nothing fit.
    pub event_context: String,
    /// Documentation blocks joined for the prompt.
    pub knowledge_context: String,
    /// Chronological history lines.
    pub history_context: String,
    /// Budget left after the fixed reserves.
    pub available: usize,
    pub events: SliceStats,
    pub documents: SliceStats,
    pub history: SliceStats,
}

/// The slice split for an intent.
pub fn split_for(intent: Intent, budget: &BudgetConfig) -> SliceSplit {
    match intent {
        Intent::Debug => budget.debug,
        Intent::Analytics => budget.analytics,
        Intent::General => budget.general,
    }
}

/// Allocate the budget and format all three context slices.
pub fn format_context(
    events: &[IndexEntry],
    documents: &[IndexEntry],
    history: &[ChatMessage],
    intent: Intent,
    user_message: &str,
    budget: &BudgetConfig,
    document_cap: usize,
) -> FormattedContext {
    let available = budget
        .total_tokens
        .saturating_sub(budget.system_prompt_reserve)
        .saturating_sub(estimate_tokens(user_message))
        .saturating_sub(budget.response_reserve);

    let split = split_for(intent, budget);
    let event_slice = (available as f32 * split.events) as usize;
    let doc_slice = (available as f32 * split.docs) as usize;
    let history_slice = (available as f32 * split.history) as usize;

    let (event_context, event_stats) = render_events(events, event_slice);
    let (knowledge_context, doc_stats) = render_documents(documents, doc_slice, document_cap);
    let (history_context, history_stats) = render_history(history, history_slice);

    FormattedContext {
        event_context,
        knowledge_context,
        history_context,
        available,
        events: event_stats,
        documents: doc_stats,
        history: history_stats,
    }
}

/// Events: per-event caps, whole-unit inclusion (see [`crate::events`]).
fn render_events(events: &[IndexEntry], slice: usize) -> (String, SliceStats) {
    let batch = format_event_batch(events, slice);
    let stats = SliceStats {
        budget: slice,
        tokens: batch.tokens,
        included: batch.included,
        offered: batch.offered,
    };
    (batch.blocks.join("\n\n"), stats)
}

/// Documents: top candidates up to the fixed cap, `[title]\ncontent` blocks,
/// accumulating while the running total stays within the slice.
fn render_documents(
    documents: &[IndexEntry],
    slice: usize,
    cap: usize,
) -> (String, SliceStats) {
    let mut blocks = Vec::new();
    let mut used = 0;

    for doc in documents.iter().take(cap) {
        let title = doc.metadata.title.as_deref().unwrap_or("Untitled");
        let block = format!("[{title}]\n{}", doc.content);
        let block_tokens = estimate_tokens(&block);
        if used + block_tokens > slice {
            break;
        }
        used += block_tokens;
        blocks.push(block);
    }

    let stats = SliceStats {
        budget: slice,
        tokens: used,
        included: blocks.len(),
        offered: documents.len(),
    };
    (blocks.join("\n\n"), stats)
}

/// History: walk most-recent-first, accumulate while the slice allows, then
/// reverse back to chronological order. When history must be truncated it
/// is always the oldest turns that are dropped, never the most recent.
fn render_history(history: &[ChatMessage], slice: usize) -> (String, SliceStats) {
    let mut lines = Vec::new();
    let mut used = 0;

    for message in history.iter().rev() {
        let line = format!("{}: {}\n", message.role.label(), message.content);
        let line_tokens = estimate_tokens(&line);
        if used + line_tokens > slice {
            break;
        }
        used += line_tokens;
        lines.push(line);
    }

    lines.reverse();

    let stats = SliceStats {
        budget: slice,
        tokens: used,
        included: lines.len(),
        offered: history.len(),
    };
    (lines.concat(), stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::entry;

    /// A budget whose `available` equals exactly `total` (no reserves), so
    /// tests can reason about slice arithmetic directly.
    fn bare_budget(total: usize) -> BudgetConfig {
        BudgetConfig {
            total_tokens: total,
            system_prompt_reserve: 0,
            response_reserve: 0,
            ..Default::default()
        }
    }

    fn doc(id: &str, title: &str, content: &str) -> IndexEntry {
        let mut e = entry(id, content);
        e.metadata.title = Some(title.into());
        e
    }

    #[test]
    fn slices_never_exceed_available() {
        let budget = BudgetConfig::default();
        for intent in Intent::ALL {
            for message in ["", "short", &"long message ".repeat(100)] {
                let ctx = format_context(&[], &[], &[], intent, message, &budget, 3);
                let total = ctx.events.budget + ctx.documents.budget + ctx.history.budget;
                assert!(
                    total <= ctx.available,
                    "{intent}: slices {total} exceed available {}",
                    ctx.available
                );
            }
        }
    }

    #[test]
    fn degenerate_budget_allocates_zero() {
        let budget = BudgetConfig {
            total_tokens: 100,
            system_prompt_reserve: 80,
            response_reserve: 80,
            ..Default::default()
        };
        let events = vec![entry("e", "event content")];
        let history = vec![ChatMessage::user("earlier question")];

        let ctx = format_context(&events, &[], &history, Intent::Debug, "hi", &budget, 3);
        assert_eq!(ctx.available, 0);
        assert_eq!(ctx.events.budget, 0);
        assert!(ctx.event_context.is_empty());
        assert!(ctx.history_context.is_empty());
    }

    #[test]
    fn debug_slice_scenario() {
        // available = 1000, debug split → event slice 600, 20 candidates →
        // 30-token per-event cap.
        let budget = bare_budget(1000);
        let events: Vec<_> = (0..20)
            .map(|i| entry(&format!("e{i}"), &format!("event {i} {}", "payload ".repeat(30))))
            .collect();

        let ctx = format_context(&events, &[], &[], Intent::Debug, "", &budget, 3);
        assert_eq!(ctx.events.budget, 600);
        assert!(ctx.events.tokens <= 600);
        for block in ctx.event_context.split("\n\n") {
            assert!(
                estimate_tokens(block) <= 30,
                "event block exceeds its 30-token cap"
            );
        }
    }

    #[test]
    fn intent_shifts_allocation() {
        let budget = bare_budget(1000);
        let debug = format_context(&[], &[], &[], Intent::Debug, "", &budget, 3);
        let general = format_context(&[], &[], &[], Intent::General, "", &budget, 3);
        let analytics = format_context(&[], &[], &[], Intent::Analytics, "", &budget, 3);

        assert_eq!(debug.events.budget, 600);
        assert_eq!(debug.documents.budget, 100);
        assert_eq!(general.documents.budget, 500);
        assert_eq!(general.events.budget, 200);
        assert_eq!(analytics.events.budget, 500);
        assert_eq!(analytics.history.budget, 300);
    }

    #[test]
    fn documents_capped_and_titled() {
        let budget = bare_budget(1000);
        let docs: Vec<_> = (0..5)
            .map(|i| doc(&format!("d{i}"), &format!("Doc {i}"), "documentation content"))
            .collect();

        let ctx = format_context(&[], &docs, &[], Intent::General, "", &budget, 3);
        assert_eq!(ctx.documents.included, 3);
        assert_eq!(ctx.documents.offered, 5);
        assert!(ctx.knowledge_context.starts_with("[Doc 0]\n"));
        assert!(!ctx.knowledge_context.contains("[Doc 3]"));
    }

    #[test]
    fn documents_stop_before_exceeding_slice() {
        // Doc slice: 100 * 0.5 = 50 tokens; each block ~30 tokens → 1 fits.
        let budget = bare_budget(100);
        let docs = vec![
            doc("d0", "A", &"text ".repeat(22)),
            doc("d1", "B", &"text ".repeat(22)),
        ];

        let ctx = format_context(&[], &docs, &[], Intent::General, "", &budget, 3);
        assert_eq!(ctx.documents.included, 1);
        assert!(ctx.documents.tokens <= ctx.documents.budget);
    }

    #[test]
    fn history_drops_oldest_first() {
        // Each line "User: 0123456789\n" is 17 chars → 5 tokens. History
        // slice = 50 * 0.3 = 15 tokens → exactly the last 3 messages fit.
        let budget = bare_budget(50);
        let history: Vec<_> = (0..10)
            .map(|i| ChatMessage::user(format!("message-{i:02}")))
            .collect();

        let ctx = format_context(&[], &[], &history, Intent::General, "", &budget, 3);
        assert_eq!(ctx.history.included, 3);

        let expected: String = history[7..]
            .iter()
            .map(|m| format!("{}: {}\n", m.role.label(), m.content))
            .collect();
        assert_eq!(ctx.history_context, expected);
    }

    #[test]
    fn full_history_stays_chronological() {
        let budget = bare_budget(4000);
        let history = vec![
            ChatMessage::user("first question"),
            ChatMessage::assistant("first answer"),
            ChatMessage::user("second question"),
        ];

        let ctx = format_context(&[], &[], &history, Intent::General, "", &budget, 3);
        assert_eq!(ctx.history.included, 3);
        let first = ctx.history_context.find("first question").unwrap();
        let second = ctx.history_context.find("second question").unwrap();
        assert!(first < second);
        assert!(ctx.history_context.contains("Assistant: first answer"));
    }

    #[test]
    fn formatting_is_deterministic() {
        let budget = BudgetConfig::default();
        let events: Vec<_> = (0..8)
            .map(|i| entry(&format!("e{i}"), &format!("event number {i}")))
            .collect();
        let docs = vec![doc("d0", "Edge", "edge documentation")];
        let history = vec![
            ChatMessage::user("why 403?"),
            ChatMessage::assistant("missing datastream id"),
        ];

        let a = format_context(&events, &docs, &history, Intent::Debug, "why?", &budget, 3);
        let b = format_context(&events, &docs, &history, Intent::Debug, "why?", &budget, 3);

        assert_eq!(a.event_context, b.event_context);
        assert_eq!(a.knowledge_context, b.knowledge_context);
        assert_eq!(a.history_context, b.history_context);
        assert_eq!(a.events.tokens, b.events.tokens);
    }

    #[test]
    fn user_message_cost_shrinks_available() {
        let budget = BudgetConfig::default();
        let short = format_context(&[], &[], &[], Intent::General, "hi", &budget, 3);
        let long_message = "tell me everything ".repeat(50);
        let long = format_context(&[], &[], &[], Intent::General, &long_message, &budget, 3);
        assert!(long.available < short.available);
    }
}
