//! Gradient-boosted regression tree training (squared-error loss).
//!
//! Each round:
//! - gradients `g_i = ŷ_i - y_i`, hessians `h_i = 1`
//! - grow one depth-limited tree with exact greedy splits
//! - add the tree, with leaves shrunk by the learning rate
//!
//! Split gain and leaf weights follow the usual second-order formulation:
//!
//! ```text
//! gain = 0.5 * [G_L²/(H_L + λ) + G_R²/(H_R + λ) - G_P²/(H_P + λ)]
//! leaf = -G / (H + λ) * η
//! ```
//!
//! Candidate split features are scored in parallel; the winner is chosen by
//! a deterministic sequential reduction so results do not depend on the
//! thread count.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::models::{BoostedRegressor, RegressionTree, TreeNode};

/// Smallest gain accepted for a split.
const MIN_SPLIT_GAIN: f64 = 1e-12;

/// Boosting hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// L2 regularization on leaf weights.
    pub reg_lambda: f64,
    /// Minimum hessian sum (row count, for squared error) per child.
    pub min_child_weight: f64,
    /// Fraction of rows sampled per tree.
    pub subsample: f64,
    pub seed: u64,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            learning_rate: 0.1,
            max_depth: 6,
            reg_lambda: 1.0,
            min_child_weight: 1.0,
            subsample: 1.0,
            seed: 42,
        }
    }
}

impl BoostParams {
    fn validate(&self) -> Result<(), ForecastError> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ForecastError::InvalidInput("learning rate must be positive".to_string()));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ForecastError::InvalidInput("subsample must be in (0, 1]".to_string()));
        }
        if !(self.reg_lambda.is_finite() && self.reg_lambda >= 0.0) {
            return Err(ForecastError::InvalidInput("reg_lambda must be non-negative".to_string()));
        }
        if !(self.min_child_weight.is_finite() && self.min_child_weight >= 0.0) {
            return Err(ForecastError::InvalidInput("min_child_weight must be non-negative".to_string()));
        }
        Ok(())
    }
}

/// Train a boosted regressor on rows `x` and targets `y`.
pub fn train_boosted<R>(x: &[R], y: &[f64], params: &BoostParams) -> Result<BoostedRegressor, ForecastError>
where
    R: AsRef<[f64]> + Sync,
{
    params.validate()?;
    if x.is_empty() {
        return Err(ForecastError::EmptyDataset("no rows to train the boosted regressor on".to_string()));
    }
    if x.len() != y.len() {
        return Err(ForecastError::InvalidInput(format!(
            "{} feature rows but {} targets",
            x.len(),
            y.len()
        )));
    }
    let n_features = x[0].as_ref().len();
    if n_features == 0 || x.iter().any(|r| r.as_ref().len() != n_features) {
        return Err(ForecastError::InvalidInput("feature rows must share a non-zero width".to_string()));
    }
    if x.iter().any(|r| r.as_ref().iter().any(|v| !v.is_finite())) || y.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::InvalidInput("training data contains non-finite values".to_string()));
    }

    let n = x.len();
    let base_score = y.iter().sum::<f64>() / n as f64;
    let mut preds = vec![base_score; n];
    let mut grads = vec![0.0; n];
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut trees = Vec::with_capacity(params.n_estimators);

    for round in 0..params.n_estimators {
        for i in 0..n {
            grads[i] = preds[i] - y[i];
        }

        let mut rows: Vec<usize> = if params.subsample < 1.0 {
            (0..n).filter(|_| rng.gen_bool(params.subsample)).collect()
        } else {
            (0..n).collect()
        };
        if rows.is_empty() {
            rows = (0..n).collect();
        }

        let mut grower = Grower {
            x,
            grads: &grads,
            params,
            n_features,
            nodes: Vec::new(),
        };
        grower.build(rows, 0);
        let tree = RegressionTree { nodes: grower.nodes };

        for (i, row) in x.iter().enumerate() {
            preds[i] += tree
                .predict(row.as_ref())
                .map_err(|e| ForecastError::InvalidInput(format!("grown tree is malformed: {e}")))?;
        }
        trees.push(tree);

        if (round + 1) % 50 == 0 {
            tracing::debug!(round = round + 1, rmse = rmse(&preds, y), "boosting progress");
        }
    }

    tracing::info!(
        trees = trees.len(),
        rmse = rmse(&preds, y),
        "trained boosted regressor"
    );

    Ok(BoostedRegressor {
        n_features,
        base_score,
        trees,
    })
}

/// Root mean squared error between predictions and targets.
pub fn rmse(pred: &[f64], y: &[f64]) -> f64 {
    if pred.is_empty() {
        return 0.0;
    }
    let sse: f64 = pred.iter().zip(y).map(|(p, t)| (p - t) * (p - t)).sum();
    (sse / pred.len() as f64).sqrt()
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct Grower<'a, R> {
    x: &'a [R],
    grads: &'a [f64],
    params: &'a BoostParams,
    n_features: usize,
    nodes: Vec<TreeNode>,
}

impl<R: AsRef<[f64]> + Sync> Grower<'_, R> {
    /// Grow a subtree over `rows` and return its root index.
    ///
    /// A node is pushed before its children, so children always have larger
    /// indices than their parent.
    fn build(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let idx = self.nodes.len();
        let g: f64 = rows.iter().map(|&i| self.grads[i]).sum();
        let h = rows.len() as f64;
        let value = -g / (h + self.params.reg_lambda) * self.params.learning_rate;
        self.nodes.push(TreeNode::Leaf { value });

        if depth >= self.params.max_depth || rows.len() < 2 {
            return idx;
        }
        let Some(split) = self.best_split(&rows, g, h) else {
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| self.x[i].as_ref()[split.feature] < split.threshold);

        let left = self.build(left_rows, depth + 1);
        let right = self.build(right_rows, depth + 1);
        self.nodes[idx] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&self, rows: &[usize], g: f64, h: f64) -> Option<SplitCandidate> {
        let per_feature: Vec<Option<SplitCandidate>> = (0..self.n_features)
            .into_par_iter()
            .map(|f| self.best_split_for_feature(f, rows, g, h))
            .collect();

        let mut best: Option<SplitCandidate> = None;
        for cand in per_feature.into_iter().flatten() {
            if best.is_none_or(|b| cand.gain > b.gain) {
                best = Some(cand);
            }
        }
        best
    }

    fn best_split_for_feature(&self, feature: usize, rows: &[usize], g: f64, h: f64) -> Option<SplitCandidate> {
        let lambda = self.params.reg_lambda;
        let min_child = self.params.min_child_weight;

        let mut sorted: Vec<(f64, f64)> = rows
            .iter()
            .map(|&i| (self.x[i].as_ref()[feature], self.grads[i]))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let parent_score = g * g / (h + lambda);
        let mut best: Option<SplitCandidate> = None;
        let mut gl = 0.0;
        let mut hl = 0.0;

        for k in 0..sorted.len() - 1 {
            gl += sorted[k].1;
            hl += 1.0;
            let (v, next) = (sorted[k].0, sorted[k + 1].0);
            if v == next {
                continue;
            }
            let gr = g - gl;
            let hr = h - hl;
            if hl < min_child || hr < min_child {
                continue;
            }
            let gain = 0.5 * (gl * gl / (hl + lambda) + gr * gr / (hr + lambda) - parent_score);
            if gain > MIN_SPLIT_GAIN && best.is_none_or(|b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: 0.5 * (v + next),
                    gain,
                });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Regressor;

    #[test]
    fn learns_a_step_function() {
        let x: Vec<[f64; 1]> = (0..40).map(|i| [i as f64 / 40.0]).collect();
        let y: Vec<f64> = x.iter().map(|r| if r[0] < 0.5 { 0.0 } else { 1.0 }).collect();

        let params = BoostParams {
            n_estimators: 100,
            ..BoostParams::default()
        };
        let model = train_boosted(&x, &y, &params).unwrap();

        assert_eq!(model.n_trees(), 100);
        assert!(model.predict(&[0.1]).unwrap() < 0.1);
        assert!(model.predict(&[0.9]).unwrap() > 0.9);
    }

    #[test]
    fn training_is_deterministic() {
        let x: Vec<[f64; 3]> = (0..30)
            .map(|i| {
                let t = i as f64;
                [t, (t * 0.7).sin(), (t * 0.3).cos()]
            })
            .collect();
        let y: Vec<f64> = x.iter().map(|r| r[0] * 0.1 + r[1]).collect();
        let params = BoostParams {
            n_estimators: 20,
            subsample: 0.8,
            ..BoostParams::default()
        };

        let a = train_boosted(&x, &y, &params).unwrap();
        let b = train_boosted(&x, &y, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn constant_target_yields_leaf_only_trees() {
        let x: Vec<[f64; 2]> = (0..10).map(|i| [i as f64, 1.0]).collect();
        let y = vec![3.0; 10];
        let model = train_boosted(&x, &y, &BoostParams::default()).unwrap();
        assert!(model.trees.iter().all(|t| t.nodes.len() == 1));
        assert!((model.predict(&[100.0, 0.0]).unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_empty_and_mismatched_inputs() {
        let empty: Vec<[f64; 3]> = Vec::new();
        assert!(matches!(
            train_boosted(&empty, &[], &BoostParams::default()),
            Err(ForecastError::EmptyDataset(_))
        ));
        assert!(matches!(
            train_boosted(&[[1.0]], &[1.0, 2.0], &BoostParams::default()),
            Err(ForecastError::InvalidInput(_))
        ));
    }

    #[test]
    fn max_depth_bounds_leaf_count() {
        let x: Vec<[f64; 1]> = (0..64).map(|i| [i as f64]).collect();
        let y: Vec<f64> = x.iter().map(|r| (r[0] * 0.37).sin()).collect();
        let params = BoostParams {
            n_estimators: 5,
            max_depth: 2,
            ..BoostParams::default()
        };
        let model = train_boosted(&x, &y, &params).unwrap();
        assert!(model.trees.iter().all(|t| t.n_leaves() <= 4));
    }
}
