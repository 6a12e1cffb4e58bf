//! Knowledge-graph embedding training.
//!
//! Produces one vector per entity and per relation of a triple corpus using
//! margin ranking loss with uniform negative sampling:
//!
//! ```text
//! L = max(0, margin - s(h, r, t) + s(h', r, t'))
//! ```
//!
//! where `(h', r, t')` corrupts either the head or the tail. Model families
//! and optimizers are resolved by name through closed registries
//! ([`MODELS`], [`OPTIMIZERS`]); unknown names are configuration errors.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::artifact;
use crate::corpus::{TripleCorpus, Vocabulary};
use crate::error::{ConfigError, DataError, SecGraphResult, TrainError};

use super::{EmbeddingSpace, l2_norm};

// ---------------------------------------------------------------------------
// Scoring functions
// ---------------------------------------------------------------------------

/// Plausibility score of a triple; higher means more plausible.
pub trait ScoringFunction: Send + Sync {
    fn score(&self, h: &[f32], r: &[f32], t: &[f32]) -> f32;

    /// Partial derivatives of the score w.r.t. `(h, r, t)`.
    fn gradient(&self, h: &[f32], r: &[f32], t: &[f32]) -> [Vec<f32>; 3];

    /// Whether entity vectors are projected back onto the unit sphere after each step.
    fn unit_entities(&self) -> bool {
        false
    }
}

/// TransE: `s = -‖h + r - t‖₂`.
pub struct TransE;

impl ScoringFunction for TransE {
    fn score(&self, h: &[f32], r: &[f32], t: &[f32]) -> f32 {
        -h.iter()
            .zip(r)
            .zip(t)
            .map(|((h, r), t)| (h + r - t).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    fn gradient(&self, h: &[f32], r: &[f32], t: &[f32]) -> [Vec<f32>; 3] {
        let diff: Vec<f32> = h.iter().zip(r).zip(t).map(|((h, r), t)| h + r - t).collect();
        let norm = l2_norm(&diff);
        if norm == 0.0 {
            let zero = vec![0.0; diff.len()];
            return [zero.clone(), zero.clone(), zero];
        }
        let dh: Vec<f32> = diff.iter().map(|d| -d / norm).collect();
        let dt: Vec<f32> = dh.iter().map(|d| -d).collect();
        [dh.clone(), dh, dt]
    }

    fn unit_entities(&self) -> bool {
        true
    }
}

/// DistMult: `s = Σ hᵢ·rᵢ·tᵢ`.
pub struct DistMult;

impl ScoringFunction for DistMult {
    fn score(&self, h: &[f32], r: &[f32], t: &[f32]) -> f32 {
        h.iter().zip(r).zip(t).map(|((h, r), t)| h * r * t).sum()
    }

    fn gradient(&self, h: &[f32], r: &[f32], t: &[f32]) -> [Vec<f32>; 3] {
        let mul = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).collect::<Vec<f32>>();
        [mul(r, t), mul(h, t), mul(h, r)]
    }

    fn unit_entities(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

/// Supported model families. Discriminants index [`MODELS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelFamily {
    TransE = 0,
    DistMult = 1,
}

/// Registry entry: canonical name and scoring-function constructor.
pub struct ModelEntry {
    pub name: &'static str,
    pub family: ModelFamily,
    pub build: fn() -> Box<dyn ScoringFunction>,
}

fn build_transe() -> Box<dyn ScoringFunction> {
    Box::new(TransE)
}

fn build_distmult() -> Box<dyn ScoringFunction> {
    Box::new(DistMult)
}

pub static MODELS: &[ModelEntry] = &[
    ModelEntry {
        name: "TransE",
        family: ModelFamily::TransE,
        build: build_transe,
    },
    ModelEntry {
        name: "DistMult",
        family: ModelFamily::DistMult,
        build: build_distmult,
    },
];

impl ModelFamily {
    pub fn entry(self) -> &'static ModelEntry {
        &MODELS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.entry().name
    }

    pub fn scorer(self) -> Box<dyn ScoringFunction> {
        (self.entry().build)()
    }

    /// Score one triple without building a boxed scorer.
    pub fn score(self, h: &[f32], r: &[f32], t: &[f32]) -> f32 {
        match self {
            ModelFamily::TransE => TransE.score(h, r, t),
            ModelFamily::DistMult => DistMult.score(h, r, t),
        }
    }
}

impl FromStr for ModelFamily {
    type Err = ConfigError;

    /// Case-insensitive registry lookup.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MODELS
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(s.trim()))
            .map(|e| e.family)
            .ok_or_else(|| ConfigError::UnknownModel {
                name: s.to_string(),
                supported: MODELS.iter().map(|e| e.name).collect::<Vec<_>>().join(", "),
            })
    }
}

impl TryFrom<String> for ModelFamily {
    type Error = ConfigError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ModelFamily> for String {
    fn from(f: ModelFamily) -> Self {
        f.name().to_string()
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Supported optimizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OptimizerKind {
    Sgd,
    Adagrad,
}

pub static OPTIMIZERS: &[(&str, OptimizerKind)] = &[
    ("SGD", OptimizerKind::Sgd),
    ("Adagrad", OptimizerKind::Adagrad),
];

impl OptimizerKind {
    pub fn name(self) -> &'static str {
        match self {
            OptimizerKind::Sgd => "SGD",
            OptimizerKind::Adagrad => "Adagrad",
        }
    }
}

impl FromStr for OptimizerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OPTIMIZERS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s.trim()))
            .map(|(_, kind)| *kind)
            .ok_or_else(|| ConfigError::UnknownOptimizer {
                name: s.to_string(),
                supported: OPTIMIZERS.iter().map(|(n, _)| *n).collect::<Vec<_>>().join(", "),
            })
    }
}

impl TryFrom<String> for OptimizerKind {
    type Error = ConfigError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<OptimizerKind> for String {
    fn from(k: OptimizerKind) -> Self {
        k.name().to_string()
    }
}

// ---------------------------------------------------------------------------
// Training configuration
// ---------------------------------------------------------------------------

/// Hyperparameters for [`train`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub model: ModelFamily,
    pub optimizer: OptimizerKind,
    pub embedding_dim: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub negatives_per_positive: usize,
    pub batch_size: usize,
    pub margin: f32,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model: ModelFamily::TransE,
            optimizer: OptimizerKind::Adagrad,
            embedding_dim: 1536,
            epochs: 100,
            learning_rate: 0.01,
            negatives_per_positive: 1,
            batch_size: 16,
            margin: 1.0,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bad = |message: &str| {
            Err(ConfigError::InvalidTrainingParam {
                message: message.into(),
            })
        };
        if self.embedding_dim == 0 {
            return bad("embedding_dim must be > 0");
        }
        if self.epochs == 0 {
            return bad("epochs must be > 0");
        }
        if self.batch_size == 0 {
            return bad("batch_size must be > 0");
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return bad("learning_rate must be a positive number");
        }
        if !self.margin.is_finite() {
            return bad("margin must be finite");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Trained model
// ---------------------------------------------------------------------------

/// Read access to a trained embedding model.
pub trait KgeModel {
    fn family(&self) -> ModelFamily;
    fn dim(&self) -> usize;
    fn vocabulary(&self) -> &Vocabulary;
    /// Score a triple given as vocabulary IDs. `None` if an ID is out of range.
    fn score_ids(&self, head: u32, relation: u32, tail: u32) -> Option<f32>;
    fn entity_embeddings(&self) -> EmbeddingSpace;
    fn relation_embeddings(&self) -> EmbeddingSpace;

    /// Score a triple given as labels. `None` if a label is unknown.
    fn score(&self, head: &str, relation: &str, tail: &str) -> Option<f32> {
        let vocab = self.vocabulary();
        self.score_ids(
            vocab.entities.id_of(head)?,
            vocab.relations.id_of(relation)?,
            vocab.entities.id_of(tail)?,
        )
    }
}

/// Output of [`train`]: vocabulary plus one vector per entity and relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    family: ModelFamily,
    dim: usize,
    vocab: Vocabulary,
    entities: Vec<Vec<f32>>,
    relations: Vec<Vec<f32>>,
    final_loss: f32,
}

impl TrainedModel {
    pub fn final_loss(&self) -> f32 {
        self.final_loss
    }

    /// Persist with bincode.
    pub fn save(&self, path: &Path) -> Result<(), DataError> {
        let bytes = bincode::serialize(self).map_err(|e| DataError::Serialization {
            message: format!("failed to serialize model: {e}"),
        })?;
        artifact::write_atomic(path, &bytes)?;
        tracing::info!(path = %path.display(), family = %self.family, "model saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, DataError> {
        let bytes = artifact::read(path)?;
        let mut model: Self = bincode::deserialize(&bytes).map_err(|e| DataError::Parse {
            path: path.display().to_string(),
            message: format!("failed to deserialize model: {e}"),
        })?;
        model.vocab.reindex();
        Ok(model)
    }

    fn space(labels: &[String], vectors: &[Vec<f32>], dim: usize) -> EmbeddingSpace {
        let mut space = EmbeddingSpace::with_dim(dim);
        for (label, v) in labels.iter().zip(vectors) {
            // Every row was created with length `dim`.
            let _ = space.insert(label.clone(), v.clone());
        }
        space
    }
}

impl KgeModel for TrainedModel {
    fn family(&self) -> ModelFamily {
        self.family
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    fn score_ids(&self, head: u32, relation: u32, tail: u32) -> Option<f32> {
        let h = self.entities.get(head as usize)?;
        let r = self.relations.get(relation as usize)?;
        let t = self.entities.get(tail as usize)?;
        Some(self.family.score(h, r, t))
    }

    fn entity_embeddings(&self) -> EmbeddingSpace {
        Self::space(self.vocab.entities.labels(), &self.entities, self.dim)
    }

    fn relation_embeddings(&self) -> EmbeddingSpace {
        Self::space(self.vocab.relations.labels(), &self.relations, self.dim)
    }
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

const ADAGRAD_EPS: f32 = 1e-10;

struct Optimizer {
    kind: OptimizerKind,
    lr: f32,
    entity_accum: Vec<Vec<f32>>,
    relation_accum: Vec<Vec<f32>>,
}

impl Optimizer {
    fn new(kind: OptimizerKind, lr: f32, entities: usize, relations: usize, dim: usize) -> Self {
        let accum = |n: usize| match kind {
            OptimizerKind::Adagrad => vec![vec![0.0; dim]; n],
            OptimizerKind::Sgd => Vec::new(),
        };
        Self {
            kind,
            lr,
            entity_accum: accum(entities),
            relation_accum: accum(relations),
        }
    }

    fn apply(&mut self, grads: &Gradients, entities: &mut [Vec<f32>], relations: &mut [Vec<f32>]) {
        for (&id, g) in &grads.entities {
            let accum = self.entity_accum.get_mut(id as usize);
            Self::step(self.kind, self.lr, &mut entities[id as usize], g, accum);
        }
        for (&id, g) in &grads.relations {
            let accum = self.relation_accum.get_mut(id as usize);
            Self::step(self.kind, self.lr, &mut relations[id as usize], g, accum);
        }
    }

    fn step(kind: OptimizerKind, lr: f32, param: &mut [f32], grad: &[f32], accum: Option<&mut Vec<f32>>) {
        match (kind, accum) {
            (OptimizerKind::Adagrad, Some(acc)) => {
                for ((p, g), a) in param.iter_mut().zip(grad).zip(acc.iter_mut()) {
                    *a += g * g;
                    *p -= lr * g / (a.sqrt() + ADAGRAD_EPS);
                }
            }
            _ => {
                for (p, g) in param.iter_mut().zip(grad) {
                    *p -= lr * g;
                }
            }
        }
    }
}

/// Loss gradients accumulated over one mini-batch.
#[derive(Default)]
struct Gradients {
    entities: HashMap<u32, Vec<f32>>,
    relations: HashMap<u32, Vec<f32>>,
}

impl Gradients {
    fn accumulate(target: &mut HashMap<u32, Vec<f32>>, id: u32, sign: f32, g: &[f32]) {
        let slot = target.entry(id).or_insert_with(|| vec![0.0; g.len()]);
        for (s, x) in slot.iter_mut().zip(g) {
            *s += sign * x;
        }
    }

    /// Add `sign · ∂s/∂θ` for the triple `(h, r, t)`.
    fn add(
        &mut self,
        scorer: &dyn ScoringFunction,
        sign: f32,
        (h, r, t): (u32, u32, u32),
        entities: &[Vec<f32>],
        relations: &[Vec<f32>],
    ) {
        let [gh, gr, gt] = scorer.gradient(
            &entities[h as usize],
            &relations[r as usize],
            &entities[t as usize],
        );
        Self::accumulate(&mut self.entities, h, sign, &gh);
        Self::accumulate(&mut self.relations, r, sign, &gr);
        Self::accumulate(&mut self.entities, t, sign, &gt);
    }
}

// ---------------------------------------------------------------------------
// Training loop
// ---------------------------------------------------------------------------

fn init_vectors(n: usize, dim: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let bound = 6.0 / (dim as f32).sqrt();
    (0..n)
        .map(|_| (0..dim).map(|_| rng.gen_range(-bound..bound)).collect())
        .collect()
}

fn project_unit(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Replace the head or the tail with a different random entity.
fn corrupt(h: u32, t: u32, num_entities: u32, rng: &mut StdRng) -> Option<(u32, u32)> {
    if num_entities < 2 {
        return None;
    }
    let pick = |orig: u32, rng: &mut StdRng| {
        let e = rng.gen_range(0..num_entities - 1);
        if e >= orig { e + 1 } else { e }
    };
    if rng.gen_bool(0.5) {
        Some((pick(h, rng), t))
    } else {
        Some((h, pick(t, rng)))
    }
}

/// Train an embedding model over every triple in `corpus`.
pub fn train(corpus: &TripleCorpus, config: &TrainingConfig) -> SecGraphResult<TrainedModel> {
    config.validate()?;
    if corpus.is_empty() {
        return Err(TrainError::EmptyCorpus.into());
    }

    let vocab = Vocabulary::build(corpus.all());
    let triples: Vec<(u32, u32, u32)> = corpus.all().filter_map(|t| vocab.encode(t)).collect();
    let scorer = config.model.scorer();
    let dim = config.embedding_dim;
    let num_entities = vocab.entities.len() as u32;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut entities = init_vectors(vocab.entities.len(), dim, &mut rng);
    let mut relations = init_vectors(vocab.relations.len(), dim, &mut rng);
    if scorer.unit_entities() {
        entities.iter_mut().for_each(|v| project_unit(v));
    }

    let mut optimizer = Optimizer::new(
        config.optimizer,
        config.learning_rate,
        entities.len(),
        relations.len(),
        dim,
    );

    tracing::info!(
        model = %config.model,
        optimizer = config.optimizer.name(),
        entities = vocab.entities.len(),
        relations = vocab.relations.len(),
        triples = triples.len(),
        dim,
        epochs = config.epochs,
        "training started"
    );

    let mut order: Vec<usize> = (0..triples.len()).collect();
    let mut final_loss = 0.0;

    for epoch in 0..config.epochs {
        order.shuffle(&mut rng);
        let mut epoch_loss = 0.0f32;
        let mut pairs = 0usize;

        for batch in order.chunks(config.batch_size) {
            let mut grads = Gradients::default();
            for &i in batch {
                let (h, r, t) = triples[i];
                for _ in 0..config.negatives_per_positive {
                    let Some((nh, nt)) = corrupt(h, t, num_entities, &mut rng) else {
                        continue;
                    };
                    let pos = scorer.score(&entities[h as usize], &relations[r as usize], &entities[t as usize]);
                    let neg = scorer.score(&entities[nh as usize], &relations[r as usize], &entities[nt as usize]);
                    let loss = (config.margin - pos + neg).max(0.0);
                    epoch_loss += loss;
                    pairs += 1;
                    if loss > 0.0 {
                        grads.add(scorer.as_ref(), -1.0, (h, r, t), &entities, &relations);
                        grads.add(scorer.as_ref(), 1.0, (nh, r, nt), &entities, &relations);
                    }
                }
            }
            optimizer.apply(&grads, &mut entities, &mut relations);
            if scorer.unit_entities() {
                for &id in grads.entities.keys() {
                    project_unit(&mut entities[id as usize]);
                }
            }
        }

        let avg = if pairs > 0 { epoch_loss / pairs as f32 } else { 0.0 };
        if !avg.is_finite() {
            return Err(TrainError::Diverged { epoch, loss: avg }.into());
        }
        tracing::debug!(epoch, loss = avg, "epoch complete");
        final_loss = avg;
    }

    tracing::info!(final_loss, "training finished");

    Ok(TrainedModel {
        family: config.model,
        dim,
        vocab,
        entities,
        relations,
        final_loss,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::tests::t;

    fn network_corpus() -> TripleCorpus {
        TripleCorpus {
            train: vec![
                t("LAN1", "contains", "DNSServer1"),
                t("LAN1", "contains", "MailServer1"),
                t("LAN1", "contains", "Router1"),
                t("DNSServer1", "wired_connection", "Router1"),
                t("MailServer1", "wired_connection", "Router1"),
                t("Laptop1", "wireless_connection", "WirelessAP"),
            ],
            valid: vec![t("Laptop2", "wireless_connection", "WirelessAP")],
            test: vec![t("Firewall1", "filter_traffic", "Router1")],
        }
    }

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            embedding_dim: 8,
            epochs: 30,
            learning_rate: 0.05,
            batch_size: 4,
            ..Default::default()
        }
    }

    #[test]
    fn registry_indices_match_discriminants() {
        for (i, entry) in MODELS.iter().enumerate() {
            assert_eq!(entry.family as usize, i);
        }
    }

    #[test]
    fn direct_scoring_matches_registry_scorer() {
        let (h, r, t) = ([0.5, -0.2, 0.1], [0.3, 0.3, -0.4], [0.9, 0.0, 0.2]);
        for entry in MODELS {
            let boxed = (entry.build)().score(&h, &r, &t);
            assert_eq!(entry.family.score(&h, &r, &t), boxed);
        }
    }

    #[test]
    fn model_lookup_is_case_insensitive() {
        assert_eq!("transe".parse::<ModelFamily>().unwrap(), ModelFamily::TransE);
        assert_eq!("DISTMULT".parse::<ModelFamily>().unwrap(), ModelFamily::DistMult);
        let err = "RotatE".parse::<ModelFamily>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownModel { .. }));
    }

    #[test]
    fn optimizer_lookup() {
        assert_eq!("adagrad".parse::<OptimizerKind>().unwrap(), OptimizerKind::Adagrad);
        assert_eq!("SGD".parse::<OptimizerKind>().unwrap(), OptimizerKind::Sgd);
        assert!(matches!(
            "Adam".parse::<OptimizerKind>(),
            Err(ConfigError::UnknownOptimizer { .. })
        ));
    }

    #[test]
    fn invalid_hyperparameters_fail_validation() {
        for config in [
            TrainingConfig { embedding_dim: 0, ..small_config() },
            TrainingConfig { epochs: 0, ..small_config() },
            TrainingConfig { batch_size: 0, ..small_config() },
            TrainingConfig { learning_rate: -1.0, ..small_config() },
        ] {
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn training_covers_the_vocabulary() {
        let corpus = network_corpus();
        let model = train(&corpus, &small_config()).unwrap();

        let entities = model.entity_embeddings();
        let relations = model.relation_embeddings();
        assert_eq!(entities.len(), 9);
        assert_eq!(relations.len(), 4);
        assert_eq!(entities.dim(), 8);
        assert!(entities.iter().all(|(_, v)| v.iter().all(|x| x.is_finite())));
        // TransE keeps entities on the unit sphere.
        for (_, v) in entities.iter() {
            assert!((l2_norm(v) - 1.0).abs() < 1e-4);
        }
        assert!(model.score("LAN1", "contains", "Router1").is_some());
        assert!(model.score("LAN1", "unknown", "Router1").is_none());
    }

    #[test]
    fn seeded_training_is_deterministic() {
        let corpus = network_corpus();
        let a = train(&corpus, &small_config()).unwrap();
        let b = train(&corpus, &small_config()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn loss_decreases_with_training() {
        let corpus = network_corpus();
        let base = TrainingConfig {
            optimizer: OptimizerKind::Sgd,
            negatives_per_positive: 4,
            ..small_config()
        };
        let short = train(&corpus, &TrainingConfig { epochs: 1, ..base.clone() }).unwrap();
        let long = train(&corpus, &TrainingConfig { epochs: 300, ..base }).unwrap();
        assert!(
            long.final_loss() < short.final_loss(),
            "{} !< {}",
            long.final_loss(),
            short.final_loss()
        );
    }

    #[test]
    fn distmult_trains() {
        let config = TrainingConfig {
            model: ModelFamily::DistMult,
            ..small_config()
        };
        let model = train(&network_corpus(), &config).unwrap();
        assert_eq!(model.family(), ModelFamily::DistMult);
        assert!(model.final_loss().is_finite());
    }

    #[test]
    fn empty_corpus_is_rejected() {
        let err = train(&TripleCorpus::default(), &small_config()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::SecGraphError::Train(TrainError::EmptyCorpus)
        ));
    }

    #[test]
    fn model_survives_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        let model = train(&network_corpus(), &small_config()).unwrap();
        model.save(&path).unwrap();

        let loaded = TrainedModel::load(&path).unwrap();
        assert_eq!(
            loaded.score("LAN1", "contains", "Router1"),
            model.score("LAN1", "contains", "Router1")
        );
        assert_eq!(loaded.entity_embeddings(), model.entity_embeddings());
    }

    #[test]
    fn transe_gradient_matches_finite_difference() {
        let (h, r, t) = (vec![0.3, -0.2], vec![0.1, 0.4], vec![-0.5, 0.2]);
        let [gh, _, _] = TransE.gradient(&h, &r, &t);
        let eps = 1e-3;
        let mut hp = h.clone();
        hp[0] += eps;
        let numeric = (TransE.score(&hp, &r, &t) - TransE.score(&h, &r, &t)) / eps;
        assert!((numeric - gh[0]).abs() < 1e-2);
    }
}
