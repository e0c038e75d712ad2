//! Reciprocal rank fusion (RRF).
//!
//! Merges ranked candidate lists from structurally different retrievers
//! into a single ranking without requiring their raw scores to be
//! comparable: each item contributes `1/(c + rank)` per list it appears
//! in, keyed by its `(source_kind, id)` identity.

use std::collections::HashMap;

use crate::models::{Chunk, SourceKind};

/// Smoothing constant; dampens the dominance of rank-1 items.
pub const DEFAULT_RRF_C: f32 = 60.0;

/// Fuse `run_lists` into the top-`k` `(score, payload)` pairs.
///
/// Items are identified by `(source_kind, id)`; the first payload observed
/// for an identity is kept as its representative, later occurrences only
/// add score. The output is sorted by fused score descending, ties broken
/// by first-seen order across the input lists.
pub fn rrf_fuse(run_lists: &[Vec<(f32, Chunk)>], k: usize, c: f32) -> Vec<(f32, Chunk)> {
    struct Entry {
        score: f32,
        first_seen: usize,
        payload: Chunk,
    }

    let mut entries: HashMap<(SourceKind, String), Entry> = HashMap::new();
    let mut seen = 0usize;

    for run in run_lists {
        for (rank0, (_raw_score, payload)) in run.iter().enumerate() {
            let contribution = 1.0 / (c + (rank0 + 1) as f32);
            let key = (payload.meta.source_kind, payload.meta.id.clone());
            entries
                .entry(key)
                .and_modify(|e| e.score += contribution)
                .or_insert_with(|| Entry {
                    score: contribution,
                    first_seen: seen,
                    payload: payload.clone(),
                });
            seen += 1;
        }
    }

    let mut ranked: Vec<Entry> = entries.into_values().collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.first_seen.cmp(&b.first_seen))
    });
    ranked.truncate(k);

    ranked.into_iter().map(|e| (e.score, e.payload)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMeta;

    fn chunk(kind: SourceKind, id: &str) -> (f32, Chunk) {
        (
            0.5,
            Chunk {
                text: format!("text {id}"),
                meta: ChunkMeta {
                    source_kind: kind,
                    file: "f".into(),
                    page: None,
                    symbol: None,
                    id: id.to_string(),
                },
            },
        )
    }

    #[test]
    fn test_no_lists_yields_empty() {
        assert!(rrf_fuse(&[], 10, DEFAULT_RRF_C).is_empty());
    }

    #[test]
    fn test_single_list_order_preserved() {
        let run = vec![
            chunk(SourceKind::Doc, "a"),
            chunk(SourceKind::Doc, "b"),
            chunk(SourceKind::Doc, "c"),
        ];
        let fused = rrf_fuse(&[run], 10, DEFAULT_RRF_C);
        let ids: Vec<&str> = fused.iter().map(|(_, c)| c.meta.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_consensus_beats_single_appearance() {
        // "x" is rank 1 in both lists; "y" is rank 1 in one list only.
        let run1 = vec![chunk(SourceKind::Doc, "x"), chunk(SourceKind::Doc, "z")];
        let run2 = vec![chunk(SourceKind::Doc, "x"), chunk(SourceKind::Pdf, "y")];
        let run3 = vec![chunk(SourceKind::Pdf, "y")];
        let fused = rrf_fuse(&[run1, run2, run3], 10, DEFAULT_RRF_C);
        let x_score = fused
            .iter()
            .find(|(_, c)| c.meta.id == "x")
            .map(|(s, _)| *s)
            .unwrap();
        let z_score = fused
            .iter()
            .find(|(_, c)| c.meta.id == "z")
            .map(|(s, _)| *s)
            .unwrap();
        assert!(x_score >= z_score);
        assert_eq!(fused[0].1.meta.id, "x");
    }

    #[test]
    fn test_dedup_keeps_first_payload() {
        let mut first = chunk(SourceKind::Doc, "dup");
        first.1.text = "first occurrence".to_string();
        let mut second = chunk(SourceKind::Doc, "dup");
        second.1.text = "second occurrence".to_string();
        let fused = rrf_fuse(&[vec![first], vec![second]], 10, DEFAULT_RRF_C);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].1.text, "first occurrence");
    }

    #[test]
    fn test_same_id_different_kind_not_deduped() {
        let run = vec![chunk(SourceKind::Doc, "a"), chunk(SourceKind::Code, "a")];
        let fused = rrf_fuse(&[run], 10, DEFAULT_RRF_C);
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn test_truncates_to_k() {
        let run = vec![
            chunk(SourceKind::Doc, "a"),
            chunk(SourceKind::Doc, "b"),
            chunk(SourceKind::Doc, "c"),
        ];
        let fused = rrf_fuse(&[run], 2, DEFAULT_RRF_C);
        assert_eq!(fused.len(), 2);
    }
}
