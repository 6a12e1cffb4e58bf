//! Cosine-similarity top-K search over an embedding space.

use serde::Serialize;

use crate::embedding::EmbeddingSpace;
use crate::embedding::text::TextEmbedder;
use crate::error::ServiceError;

/// Number of entities retrieved when the caller does not say otherwise.
pub const DEFAULT_TOP_K: usize = 5;

/// A key paired with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scored {
    /// The matching key (an entity URI for entity spaces).
    pub key: String,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
}

/// Cosine of the angle between `a` and `b`.
///
/// Returns 0.0 when either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (&av, &bv) in a.iter().zip(b) {
        dot += av * bv;
        norm_a += av * av;
        norm_b += bv * bv;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    dot / denom
}

/// The `k` entries of `space` most similar to `query`, best first.
///
/// Ties keep the space's insertion order. The result has `min(k, space.len())`
/// entries; an empty query, or one whose dimension differs from the space,
/// yields nothing.
pub fn retrieve(query: &[f32], space: &EmbeddingSpace, k: usize) -> Vec<Scored> {
    if query.is_empty() || k == 0 || space.is_empty() {
        return Vec::new();
    }
    if space.dim() != query.len() {
        tracing::warn!(
            query_dim = query.len(),
            space_dim = space.dim(),
            "query dimension differs from space, nothing retrieved"
        );
        return Vec::new();
    }

    let mut scored: Vec<Scored> = space
        .iter()
        .map(|(key, v)| Scored {
            key: key.to_string(),
            score: cosine_similarity(query, v),
        })
        .collect();
    // sort_by is stable; NaN cannot occur since zero norms short-circuit.
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    scored
}

/// Embeds free-text questions and searches an aligned entity space.
pub struct Retriever<'a, E: ?Sized> {
    embedder: &'a E,
    space: &'a EmbeddingSpace,
}

impl<'a, E: TextEmbedder + ?Sized> Retriever<'a, E> {
    pub fn new(embedder: &'a E, space: &'a EmbeddingSpace) -> Self {
        Self { embedder, space }
    }

    pub fn space(&self) -> &EmbeddingSpace {
        self.space
    }

    /// Embed `question` and return its `k` nearest entities.
    pub fn retrieve_text(&self, question: &str, k: usize) -> Result<Vec<Scored>, ServiceError> {
        let query = self.embedder.embed_query(question)?;
        let hits = retrieve(&query, self.space, k);
        tracing::debug!(
            k,
            hits = hits.len(),
            best = hits.first().map(|s| s.key.as_str()).unwrap_or(""),
            "retrieved entities"
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basis_space(n: usize) -> EmbeddingSpace {
        EmbeddingSpace::from_pairs((0..n).map(|i| {
            let mut v = vec![0.0; n];
            v[i] = 1.0;
            (format!("e{i}"), v)
        }))
        .unwrap()
    }

    #[test]
    fn cosine_edge_cases() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn result_length_is_min_of_k_and_space() {
        let space = basis_space(4);
        assert_eq!(retrieve(&[1.0, 0.0, 0.0, 0.0], &space, 2).len(), 2);
        assert_eq!(retrieve(&[1.0, 0.0, 0.0, 0.0], &space, 10).len(), 4);
        assert!(retrieve(&[1.0, 0.0, 0.0, 0.0], &space, 0).is_empty());
        assert!(retrieve(&[1.0, 0.0], &EmbeddingSpace::new(), 3).is_empty());
        assert!(retrieve(&[], &space, 3).is_empty());
    }

    #[test]
    fn mismatched_query_dimension_retrieves_nothing() {
        let space = basis_space(3);
        assert!(retrieve(&[1.0, 0.0], &space, 2).is_empty());
        assert!(retrieve(&[1.0, 0.0, 0.0, 0.0], &space, 2).is_empty());
    }

    #[test]
    fn scores_descend_and_self_ranks_first() {
        let space = EmbeddingSpace::from_pairs([
            ("a", vec![1.0, 0.0]),
            ("b", vec![0.6, 0.8]),
            ("c", vec![0.0, 1.0]),
            ("d", vec![-1.0, 0.0]),
        ])
        .unwrap();
        let hits = retrieve(&[0.6, 0.8], &space, 4);
        assert_eq!(hits[0].key, "b");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(hits[3].key, "d");
    }

    #[test]
    fn ties_keep_insertion_order() {
        let space = EmbeddingSpace::from_pairs([
            ("z", vec![0.0, 1.0]),
            ("y", vec![0.0, 1.0]),
            ("x", vec![0.0, 1.0]),
        ])
        .unwrap();
        let keys: Vec<String> = retrieve(&[0.0, 1.0], &space, 3).into_iter().map(|s| s.key).collect();
        assert_eq!(keys, ["z", "y", "x"]);
    }

    struct FixedEmbedder(Vec<f32>);

    impl TextEmbedder for FixedEmbedder {
        fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
            Ok(texts.iter().map(|_| self.0.clone()).collect())
        }
    }

    #[test]
    fn retriever_embeds_then_searches() {
        let space = basis_space(3);
        let embedder = FixedEmbedder(vec![0.0, 0.0, 2.0]);
        let retriever = Retriever::new(&embedder, &space);
        let hits = retriever.retrieve_text("which entity?", 1).unwrap();
        assert_eq!(hits, vec![Scored { key: "e2".into(), score: 1.0 }]);
    }
}
