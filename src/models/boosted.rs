//! Gradient-boosted regression trees (inference side).
//!
//! A model is `base_score + Σ tree(x)`. Leaf values already include the
//! learning-rate shrinkage applied during training, so prediction is a plain
//! sum. Trees are stored as flat node arrays with the root at index 0.
//!
//! Split convention: go left when `x[feature] < threshold`; missing (NaN)
//! values go left.

use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::models::Regressor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, TreeNode::Leaf { .. })).count()
    }

    /// Walk from the root to a leaf.
    ///
    /// Children must have larger indices than their parent; this bounds the
    /// walk and rejects cyclic trees from hand-edited artifacts.
    pub fn predict(&self, x: &[f64]) -> Result<f64, String> {
        let mut idx = 0usize;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return Ok(*value),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = *x
                        .get(*feature)
                        .ok_or_else(|| format!("split on feature {feature} but input has {} values", x.len()))?;
                    let next = if v.is_nan() || v < *threshold { *left } else { *right };
                    if next <= idx {
                        return Err(format!("node {idx} points back to node {next}"));
                    }
                    idx = next;
                }
                None => return Err(format!("node index {idx} out of range ({} nodes)", self.nodes.len())),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedRegressor {
    pub n_features: usize,
    pub base_score: f64,
    pub trees: Vec<RegressionTree>,
}

impl BoostedRegressor {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for BoostedRegressor {
    fn predict(&self, features: &[f64]) -> Result<f64, ForecastError> {
        if features.len() != self.n_features {
            return Err(ForecastError::inference(
                "boosted regressor",
                format!("expected {} features, got {}", self.n_features, features.len()),
            ));
        }
        let mut sum = self.base_score;
        for (t, tree) in self.trees.iter().enumerate() {
            sum += tree
                .predict(features)
                .map_err(|e| ForecastError::inference("boosted regressor", format!("tree {t}: {e}")))?;
        }
        if !sum.is_finite() {
            return Err(ForecastError::inference("boosted regressor", "non-finite prediction"));
        }
        Ok(sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(threshold: f64, left: f64, right: f64) -> RegressionTree {
        RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: left },
                TreeNode::Leaf { value: right },
            ],
        }
    }

    #[test]
    fn sums_base_score_and_trees() {
        let model = BoostedRegressor {
            n_features: 1,
            base_score: 0.5,
            trees: vec![stump(0.3, -0.1, 0.2), stump(0.8, 0.05, -0.05)],
        };
        assert!((model.predict(&[0.1]).unwrap() - 0.45).abs() < 1e-12);
        assert!((model.predict(&[0.5]).unwrap() - 0.75).abs() < 1e-12);
        assert!((model.predict(&[0.9]).unwrap() - 0.65).abs() < 1e-12);
    }

    #[test]
    fn missing_values_go_left() {
        let tree = stump(0.5, 1.0, 2.0);
        assert_eq!(tree.predict(&[f64::NAN]).unwrap(), 1.0);
    }

    #[test]
    fn wrong_width_is_inference_error() {
        let model = BoostedRegressor {
            n_features: 3,
            base_score: 0.0,
            trees: vec![],
        };
        assert!(matches!(model.predict(&[1.0]), Err(ForecastError::Inference { .. })));
    }

    #[test]
    fn cyclic_tree_is_rejected() {
        let tree = RegressionTree {
            nodes: vec![TreeNode::Split {
                feature: 0,
                threshold: 0.0,
                left: 0,
                right: 0,
            }],
        };
        assert!(tree.predict(&[1.0]).is_err());
    }
}
