//! Train/validation/test splitting.
//!
//! The split shuffles the input and cuts it into three contiguous slices.
//! Without a seed the shuffle draws from the thread-local RNG and is not
//! reproducible; passing a seed switches to a `StdRng` for deterministic runs.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

use super::{Triple, TripleCorpus};

/// Fractions of the corpus assigned to training and validation.
///
/// The test split receives whatever remains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitRatios {
    pub train: f64,
    pub valid: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.8,
            valid: 0.1,
        }
    }
}

impl SplitRatios {
    /// Reject ratios that would produce a negative test split.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ok = self.train.is_finite()
            && self.valid.is_finite()
            && self.train >= 0.0
            && self.valid >= 0.0
            && self.train + self.valid <= 1.0;
        if ok {
            Ok(())
        } else {
            Err(ConfigError::InvalidRatios {
                train: self.train,
                valid: self.valid,
            })
        }
    }

    /// Partition sizes `(train, valid, test)` for a corpus of `n` triples.
    pub fn sizes(&self, n: usize) -> Result<(usize, usize, usize), ConfigError> {
        self.validate()?;
        let train = (self.train * n as f64).floor() as usize;
        let valid = (self.valid * n as f64).floor() as usize;
        // Float rounding can push the floors past n when the ratios sum to 1.
        let test = n.checked_sub(train + valid).ok_or(ConfigError::InvalidRatios {
            train: self.train,
            valid: self.valid,
        })?;
        Ok((train, valid, test))
    }
}

/// Shuffle `triples` and cut them into a [`TripleCorpus`].
pub fn split(
    mut triples: Vec<Triple>,
    ratios: SplitRatios,
    seed: Option<u64>,
) -> Result<TripleCorpus, ConfigError> {
    let (train_size, valid_size, test_size) = ratios.sizes(triples.len())?;

    match seed {
        Some(seed) => triples.shuffle(&mut rand::rngs::StdRng::seed_from_u64(seed)),
        None => triples.shuffle(&mut rand::thread_rng()),
    }

    let test = triples.split_off(train_size + valid_size);
    let valid = triples.split_off(train_size);
    let train = triples;

    tracing::info!(
        train = train_size,
        valid = valid_size,
        test = test_size,
        seeded = seed.is_some(),
        "corpus split"
    );

    Ok(TripleCorpus { train, valid, test })
}
