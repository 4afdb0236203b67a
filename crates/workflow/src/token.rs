//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. This
//! approximation is accurate within ~10% for BPE tokenizers on English
//! text — it is an estimate, not a tokenizer, and every budget decision in
//! the workflow goes through it so the arithmetic stays consistent.

/// Visible marker joining the kept head and tail of a truncated string.
pub const ELISION: &str = " [...] ";

/// Fraction of the character budget kept from the start of the text.
const HEAD_FRACTION: (usize, usize) = (7, 10);
/// Fraction of the character budget kept from the end of the text.
const TAIL_FRACTION: (usize, usize) = (1, 10);

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    (text.len() + 3) / 4
}

/// Whether the text's estimated cost exceeds `limit` tokens.
pub fn exceeds(text: &str, limit: usize) -> bool {
    estimate_tokens(text) > limit
}

/// Truncate `text` so that `estimate_tokens(result) ≤ max_tokens`.
///
/// Both the earliest and the most recent part of a context block tend to
/// carry signal, so truncation keeps a readable prefix (~70% of the allowed
/// character budget) and suffix (~10%), joined by [`ELISION`] — not a naive
/// head cut. Budgets too small for that shape fall back to a plain prefix.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    if !exceeds(text, max_tokens) {
        return text.to_string();
    }

    let budget = max_tokens * 4;
    if budget == 0 {
        return String::new();
    }

    // The head+elision+tail shape needs 0.8·budget + elision ≤ budget.
    if budget < ELISION.len() * 5 {
        return text[..floor_char_boundary(text, budget)].to_string();
    }

    let head_len = budget * HEAD_FRACTION.0 / HEAD_FRACTION.1;
    let tail_len = budget * TAIL_FRACTION.0 / TAIL_FRACTION.1;

    let head = &text[..floor_char_boundary(text, head_len)];
    let tail = &text[ceil_char_boundary(text, text.len() - tail_len)..];
    format!("{head}{ELISION}{tail}")
}

/// Largest index ≤ `index` that is a UTF-8 char boundary.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Smallest index ≥ `index` that is a UTF-8 char boundary.
fn ceil_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn hundred_chars() {
        let text = "a".repeat(100);
        assert_eq!(estimate_tokens(&text), 25);
    }

    #[test]
    fn exceeds_checks_limit() {
        assert!(exceeds("hello", 1));
        assert!(!exceeds("hello", 2));
        assert!(!exceeds("", 0));
    }

    #[test]
    fn fitting_text_is_unchanged() {
        assert_eq!(truncate_to_tokens("short", 10), "short");
    }

    #[test]
    fn truncation_keeps_head_and_tail() {
        let text = format!("START{}END", "x".repeat(2000));
        let out = truncate_to_tokens(&text, 100);
        assert!(out.starts_with("START"));
        assert!(out.ends_with("END"));
        assert!(out.contains(ELISION));
        assert!(estimate_tokens(&out) <= 100);
    }

    #[test]
    fn zero_budget_is_empty() {
        assert_eq!(truncate_to_tokens("anything", 0), "");
        assert_eq!(truncate_to_tokens("", 0), "");
    }

    #[test]
    fn tiny_budget_falls_back_to_prefix() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let out = truncate_to_tokens(text, 2);
        assert_eq!(out, "abcdefgh");
        assert!(estimate_tokens(&out) <= 2);
    }

    #[test]
    fn truncation_bound_holds_for_all_budgets() {
        let text = "The Edge extension rejected the hit with status 403 because \
                    the datastream id was missing from the configuration."
            .repeat(8);
        for n in 0..200 {
            let out = truncate_to_tokens(&text, n);
            assert!(
                estimate_tokens(&out) <= n,
                "estimate {} > {} for budget {n}",
                estimate_tokens(&out),
                n
            );
        }
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "héllö wörld ".repeat(200);
        for n in [0, 1, 2, 5, 9, 17, 40] {
            let out = truncate_to_tokens(&text, n);
            assert!(estimate_tokens(&out) <= n);
        }
    }
}
