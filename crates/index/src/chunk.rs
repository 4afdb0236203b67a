//! Document chunking for knowledge base ingestion.
//!
//! Splits document text into paragraph-aware chunks sized against the same
//! 4-characters-per-token heuristic the budget allocator uses, with a short
//! tail overlap so retrieval doesn't lose context at chunk boundaries.

/// Split `text` into chunks of at most `chunk_tokens` estimated tokens.
///
/// Paragraphs (blank-line separated) are kept together when they fit; a
/// paragraph larger than the whole chunk budget is hard-split on character
/// boundaries. Each chunk after the first starts with up to
/// `overlap_tokens` of the previous chunk's tail, aligned to a word
/// boundary.
pub fn chunk_text(text: &str, chunk_tokens: usize, overlap_tokens: usize) -> Vec<String> {
    let chunk_chars = chunk_tokens.saturating_mul(4).max(1);
    let overlap_chars = overlap_tokens.saturating_mul(4);

    // Paragraph units, with oversized paragraphs hard-split.
    let mut units: Vec<String> = Vec::new();
    for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if para.chars().count() <= chunk_chars {
            units.push(para.to_string());
        } else {
            let chars: Vec<char> = para.chars().collect();
            for piece in chars.chunks(chunk_chars) {
                units.push(piece.iter().collect());
            }
        }
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for unit in units {
        let unit_len = unit.chars().count();
        if !current.is_empty() && current.chars().count() + 2 + unit_len > chunk_chars {
            let tail = overlap_tail(&current, overlap_chars);
            chunks.push(std::mem::take(&mut current));
            if !tail.is_empty() && tail.chars().count() + 2 + unit_len <= chunk_chars {
                current = tail;
            }
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(&unit);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// The last `overlap_chars` characters of `text`, trimmed forward to the
/// next word boundary so chunks never start mid-word.
fn overlap_tail(text: &str, overlap_chars: usize) -> String {
    if overlap_chars == 0 {
        return String::new();
    }
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= overlap_chars {
        return String::new();
    }
    let tail: String = chars[chars.len() - overlap_chars..].iter().collect();
    match tail.find(char::is_whitespace) {
        Some(i) => tail[i..].trim_start().to_string(),
        None => tail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_tokens(text: &str) -> usize {
        (text.len() + 3) / 4
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", 100, 10).is_empty());
        assert!(chunk_text("\n\n  \n\n", 100, 10).is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("A short document.", 100, 10);
        assert_eq!(chunks, vec!["A short document."]);
    }

    #[test]
    fn paragraphs_grouped_until_budget() {
        let text = "First paragraph here.\n\nSecond paragraph here.\n\nThird paragraph here.";
        let chunks = chunk_text(text, 12, 0);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(approx_tokens(chunk) <= 12, "chunk too big: {chunk:?}");
        }
    }

    #[test]
    fn oversized_paragraph_is_hard_split() {
        let text = "x".repeat(1000);
        let chunks = chunk_text(&text, 50, 0);
        assert_eq!(chunks.len(), 5); // 1000 chars / 200 chars per chunk
        for chunk in &chunks {
            assert!(approx_tokens(chunk) <= 50);
        }
    }

    #[test]
    fn overlap_carries_previous_tail() {
        let text = format!("{}\n\n{}", "alpha beta gamma delta", "epsilon zeta eta theta");
        let chunks = chunk_text(&text, 10, 3);
        assert_eq!(chunks.len(), 2);
        // The second chunk starts with words from the first chunk's tail.
        assert!(chunks[1].contains("delta"), "no overlap in {:?}", chunks[1]);
        assert!(chunks[1].contains("epsilon"));
    }

    #[test]
    fn chunks_respect_token_budget_with_overlap() {
        let paras: Vec<String> = (0..20)
            .map(|i| format!("Paragraph number {i} with a little bit of content in it."))
            .collect();
        let text = paras.join("\n\n");
        for chunk in chunk_text(&text, 40, 8) {
            assert!(approx_tokens(&chunk) <= 40, "chunk too big: {chunk:?}");
        }
    }
}
