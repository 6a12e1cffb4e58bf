//! Triple corpus: the string-level knowledge graph every stage reads.
//!
//! - [`Triple`]: validated `(subject, predicate, object)` statement
//! - [`TripleCorpus`]: the persisted train/valid/test partition
//! - [`split`]: shuffling splitter producing a corpus from raw triples
//! - [`turtle`]: Turtle ontology loader
//! - [`vocab`]: stable entity/relation ID assignment

pub mod split;
pub mod turtle;
pub mod vocab;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::artifact;
use crate::error::DataError;

pub use split::{SplitRatios, split};
pub use vocab::Vocabulary;

/// A `(subject, predicate, object)` statement with non-empty terms.
///
/// Serialized as a three-element JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(
    try_from = "(String, String, String)",
    into = "(String, String, String)"
)]
pub struct Triple {
    subject: String,
    predicate: String,
    object: String,
}

impl Triple {
    /// Build a triple, rejecting empty terms.
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Result<Self, DataError> {
        let (subject, predicate, object) = (subject.into(), predicate.into(), object.into());
        for (term, position) in [
            (&subject, "subject"),
            (&predicate, "predicate"),
            (&object, "object"),
        ] {
            if term.is_empty() {
                return Err(DataError::EmptyTerm { position });
            }
        }
        Ok(Self {
            subject,
            predicate,
            object,
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn object(&self) -> &str {
        &self.object
    }
}

impl TryFrom<(String, String, String)> for Triple {
    type Error = DataError;

    fn try_from((s, p, o): (String, String, String)) -> Result<Self, Self::Error> {
        Self::new(s, p, o)
    }
}

impl From<Triple> for (String, String, String) {
    fn from(t: Triple) -> Self {
        (t.subject, t.predicate, t.object)
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// The persisted train/validation/test partition of the knowledge graph.
///
/// Built once at ingestion time and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripleCorpus {
    pub train: Vec<Triple>,
    pub valid: Vec<Triple>,
    pub test: Vec<Triple>,
}

impl TripleCorpus {
    /// All triples: train, then valid, then test.
    pub fn all(&self) -> impl Iterator<Item = &Triple> {
        self.train.iter().chain(&self.valid).chain(&self.test)
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.valid.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the corpus artifact as JSON.
    pub fn save(&self, path: &Path) -> Result<(), DataError> {
        artifact::write_json(path, self)?;
        tracing::info!(
            path = %path.display(),
            train = self.train.len(),
            valid = self.valid.len(),
            test = self.test.len(),
            "corpus saved"
        );
        Ok(())
    }

    /// Load a corpus artifact. An all-empty corpus is an error.
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let corpus: Self = artifact::read_json(path)?;
        if corpus.is_empty() {
            return Err(DataError::EmptyCorpus {
                origin: path.display().to_string(),
            });
        }
        tracing::debug!(path = %path.display(), triples = corpus.len(), "corpus loaded");
        Ok(corpus)
    }
}
