//! Embedding spaces and the models that produce them.
//!
//! - [`EmbeddingSpace`]: insertion-ordered URI → vector map, persisted as a flat JSON object
//! - [`kge`]: knowledge-graph embedding training (TransE, DistMult)
//! - [`text`]: text-embedding service clients

pub mod kge;
pub mod text;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::artifact;
use crate::error::DataError;

/// Euclidean norm.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Unit-length copy of `v`. A zero vector is returned unchanged.
pub fn normalized(v: &[f32]) -> Vec<f32> {
    let norm = l2_norm(v);
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

/// Mapping from vocabulary key to a fixed-length vector.
///
/// Iteration follows insertion order; re-inserting a key replaces its
/// vector in place. The dimension is fixed by the first inserted vector
/// unless set up front with [`EmbeddingSpace::with_dim`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingSpace {
    dim: Option<usize>,
    keys: Vec<String>,
    vectors: Vec<Vec<f32>>,
    index: HashMap<String, usize>,
}

impl EmbeddingSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty space that only accepts vectors of length `dim`.
    pub fn with_dim(dim: usize) -> Self {
        Self {
            dim: Some(dim),
            ..Self::default()
        }
    }

    /// Build a space from `(key, vector)` pairs, in order.
    pub fn from_pairs<K, I>(pairs: I) -> Result<Self, DataError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Vec<f32>)>,
    {
        let mut space = Self::new();
        for (key, vector) in pairs {
            space.insert(key, vector)?;
        }
        Ok(space)
    }

    pub fn insert(&mut self, key: impl Into<String>, vector: Vec<f32>) -> Result<(), DataError> {
        let key = key.into();
        let expected = *self.dim.get_or_insert(vector.len());
        if vector.len() != expected {
            return Err(DataError::DimensionMismatch {
                key,
                expected,
                actual: vector.len(),
            });
        }
        match self.index.get(&key) {
            Some(&i) => self.vectors[i] = vector,
            None => {
                self.index.insert(key.clone(), self.keys.len());
                self.keys.push(key);
                self.vectors.push(vector);
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&[f32]> {
        self.index.get(key).map(|&i| self.vectors[i].as_slice())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Vector dimension, or 0 for a space that never received a vector.
    pub fn dim(&self) -> usize {
        self.dim.unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.keys
            .iter()
            .zip(&self.vectors)
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Write the space as a flat JSON object.
    pub fn save(&self, path: &Path) -> Result<(), DataError> {
        artifact::write_json(path, self)?;
        tracing::info!(path = %path.display(), entries = self.len(), dim = self.dim(), "embedding space saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, DataError> {
        let space: Self = artifact::read_json(path)?;
        tracing::debug!(path = %path.display(), entries = space.len(), dim = space.dim(), "embedding space loaded");
        Ok(space)
    }
}

impl Serialize for EmbeddingSpace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, vector) in self.iter() {
            map.serialize_entry(key, vector)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EmbeddingSpace {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SpaceVisitor;

        impl<'de> Visitor<'de> for SpaceVisitor {
            type Value = EmbeddingSpace;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map from key to a list of numbers")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut space = EmbeddingSpace::new();
                while let Some((key, vector)) = access.next_entry::<String, Vec<f32>>()? {
                    space.insert(key, vector).map_err(serde::de::Error::custom)?;
                }
                Ok(space)
            }
        }

        deserializer.deserialize_map(SpaceVisitor)
    }
}
