//! Context assembly: turn retrieved entities into groups of related triples
//! and render them as prompt text.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::corpus::{Triple, TripleCorpus};
use crate::retrieve::Scored;
use crate::uri::display_name;

/// Literal placed in the prompt when no triple was found for any entity.
pub const NO_CONTEXT: &str = "NO_CONTEXT";

/// How an entity is compared against triple terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Compare display names, so `net#Router` also matches `d3f/Router`.
    #[default]
    DisplayName,
    /// Compare the full URI strings.
    FullUri,
}

impl MatchMode {
    fn matches(self, entity: &str, term: &str) -> bool {
        match self {
            MatchMode::FullUri => entity == term,
            MatchMode::DisplayName => display_name(entity) == display_name(term),
        }
    }
}

/// Triples associated with one requested entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextGroup {
    pub entity: String,
    /// Similarity of the entity to the question, when it came from retrieval.
    pub score: Option<f32>,
    /// Matching triples in corpus order (train, valid, test).
    pub triples: Vec<Triple>,
}

impl ContextGroup {
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }
}

/// One group per entity, in request order.
///
/// A triple belongs to a group when its subject or object matches the
/// entity. Entities without matches still get an (empty) group.
pub fn assemble<S: AsRef<str>>(
    entities: &[S],
    corpus: &TripleCorpus,
    mode: MatchMode,
) -> Vec<ContextGroup> {
    entities
        .iter()
        .map(|entity| group_for(entity.as_ref(), None, corpus, mode))
        .collect()
}

/// Like [`assemble`], carrying each retrieval score into its group.
pub fn assemble_scored(hits: &[Scored], corpus: &TripleCorpus, mode: MatchMode) -> Vec<ContextGroup> {
    hits.iter()
        .map(|hit| group_for(&hit.key, Some(hit.score), corpus, mode))
        .collect()
}

fn group_for(entity: &str, score: Option<f32>, corpus: &TripleCorpus, mode: MatchMode) -> ContextGroup {
    let triples: Vec<Triple> = corpus
        .all()
        .filter(|t| mode.matches(entity, t.subject()) || mode.matches(entity, t.object()))
        .cloned()
        .collect();
    if triples.is_empty() {
        tracing::debug!(entity, "no triples mention entity");
    }
    ContextGroup {
        entity: entity.to_string(),
        score,
        triples,
    }
}

/// Retrieved entities with their scores, one per line.
pub fn format_similarity_results(hits: &[Scored]) -> String {
    let mut out = String::from("Similarity Search Entities:");
    for hit in hits {
        let _ = write!(out, "\n- {}: {:.4}", hit.key, hit.score);
    }
    out
}

/// Render groups as the "Associated Triples" block, terms shown by display name.
pub fn format_context(groups: &[ContextGroup]) -> String {
    let mut out = String::from("Associated Triples:");
    for group in groups {
        match group.score {
            Some(score) => {
                let _ = write!(out, "\n\nSimilarity: {score:.4}");
            }
            None => {
                let _ = write!(out, "\n\nEntity: {}", display_name(&group.entity));
            }
        }
        if group.triples.is_empty() {
            out.push_str("\n  (no matching triples found)");
        }
        for t in &group.triples {
            let _ = write!(
                out,
                "\n  - {} {} {}",
                display_name(t.subject()),
                display_name(t.predicate()),
                display_name(t.object())
            );
        }
    }
    out
}

/// The context string handed to the answer generator.
///
/// Returns [`NO_CONTEXT`] when no group holds a triple, so an empty graph
/// answer is distinguishable from a formatting artifact.
pub fn render_prompt_context(groups: &[ContextGroup]) -> String {
    if groups.iter().all(ContextGroup::is_empty) {
        NO_CONTEXT.to_string()
    } else {
        format_context(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::tests::t;

    const NET: &str = "http://example.org/network#";

    fn net(name: &str) -> String {
        format!("{NET}{name}")
    }

    fn scenario() -> TripleCorpus {
        TripleCorpus {
            train: vec![t(&net("A"), &net("contains"), &net("B"))],
            valid: vec![],
            test: vec![t(&net("B"), &net("wired_connection"), &net("C"))],
        }
    }

    #[test]
    fn two_triple_scenario() {
        let corpus = scenario();
        let groups = assemble(&[net("B"), net("A")], &corpus, MatchMode::DisplayName);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].entity, net("B"));
        assert_eq!(groups[0].triples.len(), 2);
        assert_eq!(groups[1].triples, vec![corpus.train[0].clone()]);
    }

    #[test]
    fn unknown_entity_keeps_an_empty_group() {
        let groups = assemble(&[net("Z"), net("C")], &scenario(), MatchMode::FullUri);
        assert!(groups[0].is_empty());
        assert_eq!(groups[1].triples.len(), 1);
    }

    #[test]
    fn self_loop_is_listed_once() {
        let corpus = TripleCorpus {
            train: vec![t(&net("A"), &net("linked"), &net("A"))],
            ..Default::default()
        };
        let groups = assemble(&[net("A")], &corpus, MatchMode::FullUri);
        assert_eq!(groups[0].triples.len(), 1);
    }

    #[test]
    fn match_mode_controls_namespace_collisions() {
        let corpus = TripleCorpus {
            train: vec![t(
                "http://example.org/d3f/Router",
                "http://www.w3.org/1999/02/22-rdf-syntax-ns#type",
                "http://www.w3.org/2002/07/owl#Class",
            )],
            ..Default::default()
        };
        let entity = [net("Router")];
        assert_eq!(assemble(&entity, &corpus, MatchMode::DisplayName)[0].triples.len(), 1);
        assert!(assemble(&entity, &corpus, MatchMode::FullUri)[0].is_empty());
    }

    #[test]
    fn scored_groups_render_with_similarity_headers() {
        let hits = vec![
            Scored { key: net("B"), score: 0.91234 },
            Scored { key: net("Q"), score: 0.5 },
        ];
        let groups = assemble_scored(&hits, &scenario(), MatchMode::DisplayName);
        assert_eq!(groups[0].score, Some(0.91234));

        let text = format_context(&groups);
        assert!(text.contains("Similarity: 0.9123"));
        assert!(text.contains("  - A contains B"));
        assert!(text.contains("  - B wired_connection C"));
        assert!(text.contains("(no matching triples found)"));

        let listing = format_similarity_results(&hits);
        assert!(listing.starts_with("Similarity Search Entities:"));
        assert!(listing.contains(&format!("- {}: 0.5000", net("Q"))));
    }

    #[test]
    fn prompt_context_marks_total_absence() {
        let groups = assemble(&[net("Nope")], &scenario(), MatchMode::DisplayName);
        assert_eq!(render_prompt_context(&groups), NO_CONTEXT);
        assert_eq!(render_prompt_context(&[]), NO_CONTEXT);

        let groups = assemble(&[net("A")], &scenario(), MatchMode::DisplayName);
        assert_ne!(render_prompt_context(&groups), NO_CONTEXT);
    }
}
