//! Entity and relation vocabularies with stable integer IDs.
//!
//! IDs follow sorted label order, so rebuilding the vocabulary from the same
//! triples always reproduces the same ID assignment no matter how the corpus
//! was shuffled into partitions.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::Triple;

/// Label ↔ ID table for one vocabulary class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelIndex {
    labels: Vec<String>,
    #[serde(skip)]
    ids: HashMap<String, u32>,
}

impl LabelIndex {
    fn from_sorted(labels: BTreeSet<&str>) -> Self {
        let labels: Vec<String> = labels.into_iter().map(str::to_string).collect();
        let mut index = Self {
            labels,
            ids: HashMap::new(),
        };
        index.reindex();
        index
    }

    /// Rebuild the reverse map (after deserialization).
    pub(crate) fn reindex(&mut self) {
        self.ids = self
            .labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i as u32))
            .collect();
    }

    pub fn id_of(&self, label: &str) -> Option<u32> {
        self.ids.get(label).copied()
    }

    pub fn label_of(&self, id: u32) -> Option<&str> {
        self.labels.get(id as usize).map(String::as_str)
    }

    /// Labels in ID order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Entities (subjects and objects) and relations (predicates) of a triple set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub entities: LabelIndex,
    pub relations: LabelIndex,
}

impl Vocabulary {
    pub fn build<'a>(triples: impl IntoIterator<Item = &'a Triple>) -> Self {
        let mut entities = BTreeSet::new();
        let mut relations = BTreeSet::new();
        for t in triples {
            entities.insert(t.subject());
            entities.insert(t.object());
            relations.insert(t.predicate());
        }
        Self {
            entities: LabelIndex::from_sorted(entities),
            relations: LabelIndex::from_sorted(relations),
        }
    }

    /// Map a triple to `(head, relation, tail)` IDs, if every term is known.
    pub fn encode(&self, triple: &Triple) -> Option<(u32, u32, u32)> {
        Some((
            self.entities.id_of(triple.subject())?,
            self.relations.id_of(triple.predicate())?,
            self.entities.id_of(triple.object())?,
        ))
    }

    pub(crate) fn reindex(&mut self) {
        self.entities.reindex();
        self.relations.reindex();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::tests::t;

    #[test]
    fn ids_follow_sorted_labels() {
        let triples = [t("b", "r2", "c"), t("a", "r1", "b")];
        let vocab = Vocabulary::build(&triples);
        assert_eq!(vocab.entities.labels(), ["a", "b", "c"]);
        assert_eq!(vocab.relations.labels(), ["r1", "r2"]);
        assert_eq!(vocab.entities.id_of("c"), Some(2));
        assert_eq!(vocab.relations.label_of(1), Some("r2"));
    }

    #[test]
    fn rebuild_is_order_independent() {
        let a = [t("x", "p", "y"), t("y", "q", "z"), t("z", "p", "x")];
        let b = [t("z", "p", "x"), t("x", "p", "y"), t("y", "q", "z")];
        assert_eq!(Vocabulary::build(&a), Vocabulary::build(&b));
    }

    #[test]
    fn misses_return_none() {
        let vocab = Vocabulary::build(&[t("a", "p", "b")]);
        assert_eq!(vocab.entities.id_of("zzz"), None);
        assert_eq!(vocab.entities.label_of(99), None);
        assert_eq!(vocab.encode(&t("a", "unknown", "b")), None);
        assert_eq!(vocab.encode(&t("a", "p", "b")), Some((0, 0, 1)));
    }

    #[test]
    fn reindex_restores_lookup_after_serde() {
        let vocab = Vocabulary::build(&[t("a", "p", "b")]);
        let json = serde_json::to_string(&vocab).unwrap();
        let mut back: Vocabulary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entities.id_of("b"), None);
        back.reindex();
        assert_eq!(back.entities.id_of("b"), Some(1));
    }
}
