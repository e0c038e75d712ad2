//! Dense in-memory vector store.
//!
//! Accumulates unit-normalized embedding vectors with their chunk payloads
//! and answers nearest-neighbor queries by exact inner product. Because
//! both sides are normalized, the inner product equals cosine similarity.
//!
//! Search is a brute-force scan over every stored vector. This is a
//! deliberate trade-off: results are deterministic and reproducible, which
//! an approximate index would not guarantee, and the corpus sizes this
//! engine targets make exhaustive comparison affordable. The store is
//! append-only; entries are never updated or deleted.

use crate::models::Chunk;

/// Added to the L2 norm before dividing, so a degenerate all-zero vector
/// normalizes to zero instead of NaN.
const NORM_EPSILON: f32 = 1e-12;

#[derive(Default)]
pub struct DenseStore {
    vectors: Vec<Vec<f32>>,
    payloads: Vec<Chunk>,
}

impl DenseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Append a batch of vectors and their payloads.
    ///
    /// Vectors are normalized to unit L2 norm before storage.
    ///
    /// # Panics
    ///
    /// Panics if `vectors.len() != payloads.len()`. A mismatched batch is a
    /// programming error in the indexing pipeline, not a recoverable
    /// condition.
    pub fn add(&mut self, vectors: Vec<Vec<f32>>, payloads: Vec<Chunk>) {
        assert_eq!(
            vectors.len(),
            payloads.len(),
            "vector/payload batch lengths must match"
        );
        for v in vectors {
            self.vectors.push(l2_normalize(v));
        }
        self.payloads.extend(payloads);
    }

    /// Return the `topk` highest-scoring `(score, payload)` pairs for
    /// `query`, sorted by score descending.
    ///
    /// The query is normalized the same way stored vectors are. If fewer
    /// than `topk` entries exist, all of them are returned; an empty store
    /// returns an empty list.
    pub fn search(&self, query: &[f32], topk: usize) -> Vec<(f32, Chunk)> {
        if self.vectors.is_empty() || topk == 0 {
            return Vec::new();
        }

        let q = l2_normalize(query.to_vec());
        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (dot(&q, v), i))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(topk);

        scored
            .into_iter()
            .map(|(score, i)| (score, self.payloads[i].clone()))
            .collect()
    }
}

fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt() + NORM_EPSILON;
    for x in &mut v {
        *x /= norm;
    }
    v
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkMeta, SourceKind};

    fn chunk(id: &str) -> Chunk {
        Chunk {
            text: format!("text for {id}"),
            meta: ChunkMeta {
                source_kind: SourceKind::Doc,
                file: "a.md".into(),
                page: None,
                symbol: None,
                id: id.to_string(),
            },
        }
    }

    #[test]
    fn test_self_query_scores_one() {
        let mut store = DenseStore::new();
        let v1 = vec![0.2, 0.9, -0.4];
        store.add(
            vec![v1.clone(), vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]],
            vec![chunk("c1"), chunk("c2"), chunk("c3")],
        );

        let results = store.search(&v1, 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].1.meta.id, "c1");
        assert!((results[0].0 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_store_returns_nothing() {
        let store = DenseStore::new();
        assert!(store.search(&[1.0, 0.0], 5).is_empty());
    }

    #[test]
    fn test_fewer_entries_than_topk() {
        let mut store = DenseStore::new();
        store.add(vec![vec![1.0, 0.0]], vec![chunk("only")]);
        let results = store.search(&[0.5, 0.5], 10);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_results_sorted_descending() {
        let mut store = DenseStore::new();
        store.add(
            vec![vec![1.0, 0.0], vec![0.7, 0.7], vec![0.0, 1.0]],
            vec![chunk("a"), chunk("b"), chunk("c")],
        );
        let results = store.search(&[1.0, 0.0], 3);
        let scores: Vec<f32> = results.iter().map(|(s, _)| *s).collect();
        assert!(scores[0] >= scores[1] && scores[1] >= scores[2]);
        assert_eq!(results[0].1.meta.id, "a");
    }

    #[test]
    fn test_zero_vector_does_not_produce_nan() {
        let mut store = DenseStore::new();
        store.add(vec![vec![0.0, 0.0, 0.0]], vec![chunk("zero")]);
        let results = store.search(&[1.0, 0.0, 0.0], 1);
        assert_eq!(results.len(), 1);
        assert!(results[0].0.is_finite());
    }

    #[test]
    #[should_panic(expected = "batch lengths must match")]
    fn test_mismatched_batch_panics() {
        let mut store = DenseStore::new();
        store.add(vec![vec![1.0]], vec![]);
    }

    #[test]
    fn test_entry_count_accumulates() {
        let mut store = DenseStore::new();
        store.add(vec![vec![1.0, 0.0]], vec![chunk("a")]);
        store.add(
            vec![vec![0.0, 1.0], vec![1.0, 1.0]],
            vec![chunk("b"), chunk("c")],
        );
        assert_eq!(store.len(), 3);
    }
}
