//! Link-prediction evaluation of a trained model.
//!
//! Each [`EvalCase`] asks the model to recover the head, the tail, or both of
//! a known statement. The true entity is ranked against every entity in the
//! vocabulary; ranks are summarized as Hits@1/3/10 and mean reciprocal rank.
//! Named case groups are evaluated in parallel.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::embedding::kge::KgeModel;
use crate::error::EvalError;
use crate::uri::display_name;

/// Which side of the statement is predicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictTarget {
    Head,
    Tail,
    Both,
}

/// A known statement to predict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalCase {
    pub head: String,
    pub relation: String,
    pub tail: String,
    pub target: PredictTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Head,
    Tail,
}

/// One ranked prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub case: usize,
    pub side: Side,
    /// The entity that should have been predicted.
    pub expected: String,
    /// 1-based rank of `expected` among all entities.
    pub rank: usize,
}

impl Prediction {
    pub fn reciprocal_rank(&self) -> f64 {
        1.0 / self.rank as f64
    }

    pub fn hit_at(&self, k: usize) -> bool {
        self.rank <= k
    }
}

/// Ranks and averaged metrics for one group of cases.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalReport {
    pub group: String,
    pub predictions: Vec<Prediction>,
    /// Cases whose head, relation or tail is not in the vocabulary.
    pub skipped: usize,
    pub hits_at_1: f64,
    pub hits_at_3: f64,
    pub hits_at_10: f64,
    pub mrr: f64,
}

impl EvalReport {
    fn new(group: String, predictions: Vec<Prediction>, skipped: usize) -> Self {
        let n = predictions.len();
        let mean = |f: &dyn Fn(&Prediction) -> f64| {
            if n == 0 {
                0.0
            } else {
                predictions.iter().map(f).sum::<f64>() / n as f64
            }
        };
        let hits = |k: usize| mean(&|p: &Prediction| if p.hit_at(k) { 1.0 } else { 0.0 });
        let (hits_at_1, hits_at_3, hits_at_10) = (hits(1), hits(3), hits(10));
        let mrr = mean(&|p: &Prediction| p.reciprocal_rank());
        Self {
            group,
            predictions,
            skipped,
            hits_at_1,
            hits_at_3,
            hits_at_10,
            mrr,
        }
    }

    /// Plain-text report, one block per case.
    pub fn render(&self, cases: &[EvalCase]) -> String {
        let mut out = format!("Group: {}\n", self.group);
        let mut last_case = None;
        for p in &self.predictions {
            if last_case != Some(p.case) {
                if let Some(case) = cases.get(p.case) {
                    let _ = writeln!(
                        out,
                        "\n{} -[{}]-> {}",
                        display_name(&case.head),
                        display_name(&case.relation),
                        display_name(&case.tail)
                    );
                }
                last_case = Some(p.case);
            }
            let _ = writeln!(out, "[{:?} Prediction] - {}", p.side, display_name(&p.expected));
            let _ = writeln!(out, "  Rank: {}", p.rank);
            let _ = writeln!(
                out,
                "  Hits@1: {}, Hits@3: {}, Hits@10: {}",
                u8::from(p.hit_at(1)),
                u8::from(p.hit_at(3)),
                u8::from(p.hit_at(10))
            );
            let _ = writeln!(out, "  MRR: {:.6}", p.reciprocal_rank());
        }
        if !self.predictions.is_empty() {
            let _ = writeln!(out, "\nTotal metrics:");
            let _ = writeln!(
                out,
                "  Hits@1: {:.4}, Hits@3: {:.4}, Hits@10: {:.4}",
                self.hits_at_1, self.hits_at_3, self.hits_at_10
            );
            let _ = writeln!(out, "  MRR: {:.6}", self.mrr);
        }
        if self.skipped > 0 {
            let _ = writeln!(out, "\nSkipped {} case(s) with unknown labels.", self.skipped);
        }
        out
    }
}

/// Rank of `expected` when one side of `(head, relation, tail)` is replaced by
/// every entity in turn: 1 + the number of strictly better-scoring entities.
fn rank_of<M: KgeModel + ?Sized>(model: &M, h: u32, r: u32, t: u32, side: Side) -> usize {
    let n = model.vocabulary().entities.len() as u32;
    let score_with = |e: u32| match side {
        Side::Head => model.score_ids(e, r, t),
        Side::Tail => model.score_ids(h, r, e),
    };
    let expected = match side {
        Side::Head => h,
        Side::Tail => t,
    };
    let Some(true_score) = score_with(expected) else {
        return n as usize;
    };
    1 + (0..n)
        .filter(|&e| e != expected)
        .filter(|&e| score_with(e).is_some_and(|s| s > true_score))
        .count()
}

/// Rank every case in a group.
pub fn evaluate<M: KgeModel + ?Sized>(model: &M, group: &str, cases: &[EvalCase]) -> EvalReport {
    let vocab = model.vocabulary();
    let mut predictions = Vec::new();
    let mut skipped = 0;

    for (i, case) in cases.iter().enumerate() {
        let ids = (
            vocab.entities.id_of(&case.head),
            vocab.relations.id_of(&case.relation),
            vocab.entities.id_of(&case.tail),
        );
        let (Some(h), Some(r), Some(t)) = ids else {
            tracing::warn!(
                group,
                head = %case.head,
                relation = %case.relation,
                tail = %case.tail,
                "skipping case with label outside the vocabulary"
            );
            skipped += 1;
            continue;
        };

        if matches!(case.target, PredictTarget::Tail | PredictTarget::Both) {
            predictions.push(Prediction {
                case: i,
                side: Side::Tail,
                expected: case.tail.clone(),
                rank: rank_of(model, h, r, t, Side::Tail),
            });
        }
        if matches!(case.target, PredictTarget::Head | PredictTarget::Both) {
            predictions.push(Prediction {
                case: i,
                side: Side::Head,
                expected: case.head.clone(),
                rank: rank_of(model, h, r, t, Side::Head),
            });
        }
    }

    let report = EvalReport::new(group.to_string(), predictions, skipped);
    tracing::info!(
        group,
        predictions = report.predictions.len(),
        skipped,
        hits_at_10 = report.hits_at_10,
        mrr = report.mrr,
        "group evaluated"
    );
    report
}

/// Named groups of evaluation cases.
pub type CaseGroups = BTreeMap<String, Vec<EvalCase>>;

/// Load case groups from TOML: one array of tables per group name.
///
/// ```toml
/// [[mitigation]]
/// head = "http://example.org/stix#FilterNetworkTraffic"
/// relation = "http://example.org/stix#mitigates"
/// tail = "http://example.org/stix#DirectNetworkFlood"
/// target = "head"
/// ```
pub fn load_cases(path: &Path) -> Result<CaseGroups, EvalError> {
    let content = std::fs::read_to_string(path).map_err(|e| EvalError::CaseFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    toml::from_str(&content).map_err(|e| EvalError::CaseFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Evaluate every group in parallel. Reports come back in group-name order.
pub fn evaluate_groups<M: KgeModel + Sync + ?Sized>(model: &M, groups: &CaseGroups) -> Vec<EvalReport> {
    groups
        .par_iter()
        .map(|(name, cases)| evaluate(model, name, cases))
        .collect()
}
