//! Vector similarity and hybrid search utilities.
//!
//! Pure-Rust implementations of:
//! - Cosine similarity
//! - Reciprocal Rank Fusion (RRF) for merging ranked result lists

use tracepilot_core::index::IndexEntry;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank entries by cosine similarity to a query embedding.
///
/// Returns entries sorted by descending similarity, with `score` set to the
/// cosine similarity value. Only entries that have embeddings and meet the
/// minimum score threshold are included.
pub fn vector_search(
    entries: &[IndexEntry],
    query_embedding: &[f32],
    limit: usize,
    min_score: f32,
) -> Vec<IndexEntry> {
    let mut scored: Vec<(f32, IndexEntry)> = entries
        .iter()
        .filter_map(|entry| {
            let emb = entry.embedding.as_ref()?;
            let sim = cosine_similarity(emb, query_embedding);
            if sim >= min_score {
                let mut e = entry.clone();
                e.score = sim;
                Some((sim, e))
            } else {
                None
            }
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored.into_iter().map(|(_, e)| e).collect()
}

/// Reciprocal Rank Fusion (RRF) — merge two ranked result lists.
///
/// Each entry's final score = sum of 1/(k + rank) across both lists.
/// The constant k controls how much weight is given to lower-ranked items.
/// Standard value is k=60.
///
/// Returns merged results sorted by RRF score, deduplicated by entry ID.
pub fn reciprocal_rank_fusion(
    keyword_results: &[IndexEntry],
    vector_results: &[IndexEntry],
    k: u32,
    limit: usize,
) -> Vec<IndexEntry> {
    use std::collections::HashMap;

    let k = k as f32;

    // Map: id → (rrf_score, best_entry)
    let mut scores: HashMap<String, (f32, IndexEntry)> = HashMap::new();

    for results in [keyword_results, vector_results] {
        for (rank, entry) in results.iter().enumerate() {
            let rrf_score = 1.0 / (k + rank as f32 + 1.0);
            scores
                .entry(entry.id.clone())
                .and_modify(|(score, _)| *score += rrf_score)
                .or_insert_with(|| (rrf_score, entry.clone()));
        }
    }

    // Collect, sort by RRF score descending
    let mut results: Vec<IndexEntry> = scores
        .into_values()
        .map(|(score, mut entry)| {
            entry.score = score;
            entry
        })
        .collect();

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tracepilot_core::index::EntryMetadata;

    fn entry(id: &str, embedding: Option<Vec<f32>>) -> IndexEntry {
        IndexEntry {
            id: id.into(),
            content: format!("Content for {id}"),
            metadata: EntryMetadata::default(),
            created_at: Utc::now(),
            score: 0.0,
            embedding,
        }
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_empty_or_mismatched_is_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn vector_search_ranks_by_similarity() {
        let query = vec![1.0, 0.0, 0.0];
        let entries = vec![
            entry("a", Some(vec![0.0, 1.0, 0.0])), // orthogonal = 0
            entry("b", Some(vec![1.0, 0.0, 0.0])), // identical = 1
            entry("c", Some(vec![0.5, 0.5, 0.0])), // partial = ~0.707
        ];

        let results = vector_search(&entries, &query, 10, 0.0);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, "b");
        assert_eq!(results[1].id, "c");
        assert_eq!(results[2].id, "a");
    }

    #[test]
    fn vector_search_respects_min_score_and_limit() {
        let query = vec![1.0, 0.0];
        let entries = vec![
            entry("a", Some(vec![1.0, 0.0])), // sim = 1.0
            entry("b", Some(vec![0.0, 1.0])), // sim = 0.0
            entry("c", None),                 // no embedding
        ];

        let results = vector_search(&entries, &query, 10, 0.5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");

        let results = vector_search(&entries, &query, 1, 0.0);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn rrf_merges_two_lists() {
        let keyword = vec![entry("a", None), entry("b", None), entry("c", None)];
        let vector = vec![entry("b", None), entry("d", None), entry("a", None)];

        let results = reciprocal_rank_fusion(&keyword, &vector, 60, 10);

        // "b" appears at rank 1 in keyword + rank 0 in vector = highest combined
        assert_eq!(results[0].id, "b");
        assert_eq!(results[1].id, "a");
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn rrf_deduplicates_and_respects_limit() {
        let list = vec![entry("x", None), entry("y", None)];
        let results = reciprocal_rank_fusion(&list, &list, 60, 10);
        assert_eq!(results.len(), 2);

        let keyword: Vec<_> = (0..20).map(|i| entry(&format!("k{i}"), None)).collect();
        let results = reciprocal_rank_fusion(&keyword, &[], 60, 5);
        assert_eq!(results.len(), 5);
        assert_eq!(results[0].id, "k0");
    }

    #[test]
    fn rrf_empty_lists() {
        let results = reciprocal_rank_fusion(&[], &[], 60, 10);
        assert!(results.is_empty());
    }
}
