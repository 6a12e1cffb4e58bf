//! Linear alignment of one embedding space into another.
//!
//! The KGE model and the text-embedding service place the same vocabulary in
//! unrelated coordinate systems. [`align`] fits an ordinary least-squares map
//! `target ≈ source · Wᵀ + b` over the keys both spaces share, then projects
//! the source vectors into the target geometry so graph entities can be
//! compared directly against embedded questions.
//!
//! The fit is solved through an SVD of the centered design matrix. When the
//! system is rank-deficient (fewer shared keys than dimensions, or duplicate
//! vectors) this yields the minimum-norm least-squares solution rather than
//! failing. With no spread at all (a single shared key, or identical source
//! directions) the weights are zero and the intercept is the target mean.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::embedding::{EmbeddingSpace, normalized};
use crate::error::AlignmentError;

/// How fitted maps are applied when producing the aligned space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// `x · Wᵀ`. The intercept is used while fitting but dropped when projecting.
    #[default]
    LinearOnly,
    /// `x · Wᵀ + b`.
    WithIntercept,
}

/// A fitted affine map from source to target coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearMap {
    /// Shape `target_dim × source_dim`.
    weights: DMatrix<f64>,
    /// One entry per target dimension.
    intercept: DVector<f64>,
}

impl LinearMap {
    pub fn source_dim(&self) -> usize {
        self.weights.ncols()
    }

    pub fn target_dim(&self) -> usize {
        self.weights.nrows()
    }

    pub fn weights(&self) -> &DMatrix<f64> {
        &self.weights
    }

    pub fn intercept(&self) -> &DVector<f64> {
        &self.intercept
    }

    /// Map a source vector (already normalized by the caller) into target space.
    pub fn project(&self, x: &[f32], projection: Projection) -> Vec<f32> {
        let x = DVector::from_iterator(x.len(), x.iter().map(|&v| f64::from(v)));
        let mut y = &self.weights * x;
        if projection == Projection::WithIntercept {
            y += &self.intercept;
        }
        y.iter().map(|&v| v as f32).collect()
    }
}

/// Keys that did and did not take part in the alignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageReport {
    pub aligned: usize,
    pub source_only: Vec<String>,
    pub target_only: Vec<String>,
}

impl CoverageReport {
    pub fn is_complete(&self) -> bool {
        self.source_only.is_empty() && self.target_only.is_empty()
    }
}

/// Result of [`align`].
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Source keys in the intersection, projected into target space.
    pub space: EmbeddingSpace,
    pub map: LinearMap,
    pub coverage: CoverageReport,
}

fn check_finite(space: &'static str, key: &str, v: &[f32]) -> Result<(), AlignmentError> {
    if v.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(AlignmentError::NonFinite {
            space,
            key: key.to_string(),
        })
    }
}

/// Align `source` into the coordinate system of `target`.
///
/// Only keys present in both spaces participate; the output keeps the
/// source's key order and has the target's dimension.
pub fn align(
    source: &EmbeddingSpace,
    target: &EmbeddingSpace,
    projection: Projection,
) -> Result<Alignment, AlignmentError> {
    let shared: Vec<&str> = source
        .keys()
        .iter()
        .map(String::as_str)
        .filter(|k| target.contains(k))
        .collect();

    let coverage = CoverageReport {
        aligned: shared.len(),
        source_only: source
            .keys()
            .iter()
            .filter(|k| !target.contains(k))
            .cloned()
            .collect(),
        target_only: target
            .keys()
            .iter()
            .filter(|k| !source.contains(k))
            .cloned()
            .collect(),
    };

    if shared.is_empty() {
        return Err(AlignmentError::EmptyIntersection {
            source_len: source.len(),
            target_len: target.len(),
        });
    }
    if !coverage.is_complete() {
        tracing::warn!(
            aligned = coverage.aligned,
            source_only = coverage.source_only.len(),
            target_only = coverage.target_only.len(),
            "alignment coverage gap: keys missing from one space are left out"
        );
    }

    let mut xs = Vec::with_capacity(shared.len());
    let mut ys = Vec::with_capacity(shared.len());
    for key in &shared {
        // Both lookups succeed: `shared` was filtered on membership in each space.
        let (Some(x), Some(y)) = (source.get(key), target.get(key)) else {
            continue;
        };
        check_finite("source", key, x)?;
        check_finite("target", key, y)?;
        xs.push(normalized(x));
        ys.push(normalized(y));
    }

    let map = fit(&xs, &ys, source.dim(), target.dim())?;

    let mut space = EmbeddingSpace::with_dim(target.dim());
    for (key, x) in shared.iter().zip(&xs) {
        space
            .insert(*key, map.project(x, projection))
            .map_err(|e| AlignmentError::Solver {
                message: e.to_string(),
            })?;
    }

    tracing::info!(
        aligned = space.len(),
        source_dim = map.source_dim(),
        target_dim = map.target_dim(),
        ?projection,
        "embedding space aligned"
    );

    Ok(Alignment {
        space,
        map,
        coverage,
    })
}

/// Ordinary least squares with intercept: centre both sides, solve `Xc·B = Yc`.
fn fit(
    xs: &[Vec<f32>],
    ys: &[Vec<f32>],
    source_dim: usize,
    target_dim: usize,
) -> Result<LinearMap, AlignmentError> {
    let n = xs.len();
    let x = DMatrix::from_fn(n, source_dim, |i, j| f64::from(xs[i][j]));
    let y = DMatrix::from_fn(n, target_dim, |i, j| f64::from(ys[i][j]));

    let x_mean = DVector::from_fn(source_dim, |j, _| x.column(j).mean());
    let y_mean = DVector::from_fn(target_dim, |j, _| y.column(j).mean());
    let xc = DMatrix::from_fn(n, source_dim, |i, j| x[(i, j)] - x_mean[j]);
    let yc = DMatrix::from_fn(n, target_dim, |i, j| y[(i, j)] - y_mean[j]);

    let svd = xc.svd(true, true);
    let max_sv = svd.singular_values.max();
    // Same cutoff as LAPACK's gelsd default rcond.
    let tol = max_sv * (n.max(source_dim) as f64) * f64::EPSILON;
    if max_sv <= 0.0 || svd.rank(tol) == 0 {
        // Nothing to regress on: predict the target mean for every input.
        tracing::warn!(
            samples = n,
            source_dim,
            target_dim,
            "alignment fit is degenerate, falling back to zero weights and mean intercept"
        );
        return Ok(LinearMap {
            weights: DMatrix::zeros(target_dim, source_dim),
            intercept: y_mean,
        });
    }
    if svd.rank(tol) < source_dim {
        tracing::debug!(
            rank = svd.rank(tol),
            source_dim,
            samples = n,
            "rank-deficient alignment fit, using minimum-norm solution"
        );
    }

    let b = svd
        .solve(&yc, tol)
        .map_err(|message| AlignmentError::Solver {
            message: message.to_string(),
        })?;

    let intercept = &y_mean - b.tr_mul(&x_mean);
    Ok(LinearMap {
        weights: b.transpose(),
        intercept,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn random_unit_space(keys: &[String], dim: usize, seed: u64) -> EmbeddingSpace {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        EmbeddingSpace::from_pairs(keys.iter().map(|k| {
            let v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
            (k.clone(), normalized(&v))
        }))
        .unwrap()
    }

    fn keys(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i}")).collect()
    }

    fn assert_close(a: &[f32], b: &[f32], tol: f32) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < tol, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn identical_spaces_align_to_identity() {
        let space = random_unit_space(&keys("e", 20), 4, 1);
        let result = align(&space, &space, Projection::LinearOnly).unwrap();

        let w = result.map.weights();
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((w[(i, j)] - expected).abs() < 1e-6);
            }
        }
        assert!(result.map.intercept().iter().all(|b| b.abs() < 1e-6));
        for (key, v) in space.iter() {
            assert_close(result.space.get(key).unwrap(), v, 1e-4);
        }
    }

    #[test]
    fn rotation_into_larger_space_is_recovered() {
        let source = random_unit_space(&keys("e", 15), 3, 2);
        let (s, c) = (0.5f32, 0.75f32.sqrt());
        // Rotate about z and pad with two zero dimensions; norms are preserved.
        let target = EmbeddingSpace::from_pairs(source.iter().map(|(k, v)| {
            let rotated = vec![c * v[0] - s * v[1], s * v[0] + c * v[1], v[2], 0.0, 0.0];
            (k.to_string(), rotated)
        }))
        .unwrap();

        let result = align(&source, &target, Projection::LinearOnly).unwrap();
        assert_eq!(result.space.dim(), 5);
        assert_eq!(result.map.target_dim(), 5);
        assert_eq!(result.map.source_dim(), 3);
        for (key, v) in target.iter() {
            assert_close(result.space.get(key).unwrap(), v, 1e-4);
        }
    }

    #[test]
    fn output_is_exactly_the_intersection() {
        let all = keys("k", 8);
        let source = random_unit_space(&all[..6], 3, 3);
        let target = random_unit_space(&all[3..], 5, 4);

        let result = align(&source, &target, Projection::LinearOnly).unwrap();
        assert_eq!(result.space.keys(), &all[3..6]);
        assert_eq!(result.coverage.aligned, 3);
        assert_eq!(result.coverage.source_only, &all[..3]);
        assert_eq!(result.coverage.target_only, &all[6..]);
        assert!(!result.coverage.is_complete());
    }

    #[test]
    fn empty_intersection_fails() {
        let source = random_unit_space(&keys("a", 3), 2, 5);
        let target = random_unit_space(&keys("b", 3), 2, 6);
        assert!(matches!(
            align(&source, &target, Projection::LinearOnly),
            Err(AlignmentError::EmptyIntersection {
                source_len: 3,
                target_len: 3
            })
        ));
    }

    #[test]
    fn more_dimensions_than_samples_degrades_gracefully() {
        let k = keys("e", 3);
        let source = random_unit_space(&k, 16, 7);
        let target = random_unit_space(&k, 8, 8);
        let result = align(&source, &target, Projection::LinearOnly).unwrap();
        assert_eq!(result.space.len(), 3);
        assert!(result.space.iter().all(|(_, v)| v.iter().all(|x| x.is_finite())));
    }

    #[test]
    fn identical_source_vectors_fall_back_to_the_mean() {
        let source = EmbeddingSpace::from_pairs([
            ("a", vec![1.0, 0.0]),
            ("b", vec![2.0, 0.0]),
            ("c", vec![3.0, 0.0]),
        ])
        .unwrap();
        let target = EmbeddingSpace::from_pairs([
            ("a", vec![1.0, 0.0, 0.0]),
            ("b", vec![0.0, 1.0, 0.0]),
            ("c", vec![0.0, 0.0, 1.0]),
        ])
        .unwrap();

        let linear = align(&source, &target, Projection::LinearOnly).unwrap();
        assert!(linear.map.weights().iter().all(|&w| w == 0.0));
        assert_eq!(linear.space.len(), 3);
        assert!(linear.space.iter().all(|(_, v)| v.iter().all(|&x| x == 0.0)));

        let affine = align(&source, &target, Projection::WithIntercept).unwrap();
        let third = 1.0 / 3.0;
        assert_close(affine.space.get("b").unwrap(), &[third, third, third], 1e-6);
    }

    #[test]
    fn single_shared_key_aligns_to_zero() {
        let source = EmbeddingSpace::from_pairs([("only", vec![0.3, 0.4])]).unwrap();
        let target = EmbeddingSpace::from_pairs([("only", vec![1.0, 0.0, 0.0, 0.0])]).unwrap();
        let result = align(&source, &target, Projection::LinearOnly).unwrap();
        assert_eq!(result.space.dim(), 4);
        assert_close(result.space.get("only").unwrap(), &[0.0; 4], 1e-9);
        assert_close(
            &result.map.intercept().iter().map(|&b| b as f32).collect::<Vec<_>>(),
            &[1.0, 0.0, 0.0, 0.0],
            1e-9,
        );
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let source = EmbeddingSpace::from_pairs([("a", vec![f32::NAN, 0.0]), ("b", vec![0.0, 1.0])]).unwrap();
        let target = EmbeddingSpace::from_pairs([("a", vec![1.0, 0.0]), ("b", vec![0.0, 1.0])]).unwrap();
        assert!(matches!(
            align(&source, &target, Projection::LinearOnly),
            Err(AlignmentError::NonFinite { space: "source", .. })
        ));
    }

    #[test]
    fn zero_vectors_are_not_divided() {
        let source = EmbeddingSpace::from_pairs([
            ("a", vec![0.0, 0.0]),
            ("b", vec![1.0, 0.0]),
            ("c", vec![0.0, 1.0]),
        ])
        .unwrap();
        let result = align(&source, &source, Projection::LinearOnly).unwrap();
        assert_close(result.space.get("a").unwrap(), &[0.0, 0.0], 1e-5);
    }

    #[test]
    fn intercept_only_differs_by_the_fitted_bias() {
        let k = keys("e", 12);
        let source = random_unit_space(&k, 3, 10);
        // Shift every target away from the origin so the fit needs a bias.
        let target = EmbeddingSpace::from_pairs(source.iter().map(|(key, v)| {
            (key.to_string(), vec![v[0] + 2.0, v[1] - 1.0, v[2] + 0.5])
        }))
        .unwrap();

        let linear = align(&source, &target, Projection::LinearOnly).unwrap();
        let affine = align(&source, &target, Projection::WithIntercept).unwrap();
        assert_eq!(linear.map, affine.map);

        let bias: Vec<f32> = linear.map.intercept().iter().map(|&b| b as f32).collect();
        assert!(bias.iter().any(|b| b.abs() > 1e-3));
        for key in &k {
            let l = linear.space.get(key).unwrap();
            let shifted: Vec<f32> = l.iter().zip(&bias).map(|(x, b)| x + b).collect();
            assert_close(affine.space.get(key).unwrap(), &shifted, 1e-5);
        }

        // OLS optimality: keeping the intercept never fits the normalized targets worse.
        let sse = |space: &EmbeddingSpace| -> f32 {
            k.iter()
                .map(|key| {
                    let y = normalized(target.get(key).unwrap());
                    let p = space.get(key).unwrap();
                    y.iter().zip(p).map(|(a, b)| (a - b).powi(2)).sum::<f32>()
                })
                .sum()
        };
        assert!(sse(&affine.space) <= sse(&linear.space) + 1e-5);
    }
}
