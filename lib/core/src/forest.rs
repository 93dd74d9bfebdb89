//! Random forest regression.
//!
//! Bagged CART trees split on mean squared error. Each tree is grown on a
//! bootstrap sample drawn from a seeded RNG, so a forest fitted twice with
//! the same seed and data is identical. Trees are grown in parallel.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Hard limit on tree depth, applied even when `TreeParams::max_depth` is
/// `None`. Keeps growth, prediction and (de)serialization of a tree within a
/// small, fixed stack budget whatever the target distribution looks like.
pub const MAX_TREE_DEPTH: usize = 64;

/// Leaf node: mean target of the training samples that reached it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionLeaf {
    pub value: f64,
    pub n_samples: usize,
}

/// Internal node. Samples with `feature <= threshold` go left.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionSplit {
    pub feature: usize,
    pub threshold: f64,
    pub left: Box<RegressionNode>,
    pub right: Box<RegressionNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegressionNode {
    Split(RegressionSplit),
    Leaf(RegressionLeaf),
}

impl RegressionNode {
    /// Leaves have depth 0
    pub fn depth(&self) -> usize {
        match self {
            RegressionNode::Leaf(_) => 0,
            RegressionNode::Split(s) => 1 + s.left.depth().max(s.right.depth()),
        }
    }

    fn predict(&self, row: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                RegressionNode::Leaf(leaf) => return leaf.value,
                RegressionNode::Split(s) => {
                    node = if row[s.feature] <= s.threshold { &s.left } else { &s.right };
                }
            }
        }
    }
}

/// Growth limits shared by every tree of a forest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

/// Best split found for a node: feature, threshold, and how many of the
/// sorted samples fall on the left
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    left_len: usize,
    score: f64,
}

/// Training view over a row-major feature matrix
struct TreeBuilder<'a> {
    x: &'a [f64],
    y: &'a [f64],
    dim: usize,
    params: TreeParams,
}

impl TreeBuilder<'_> {
    #[inline]
    fn value(&self, sample: usize, feature: usize) -> f64 {
        self.x[sample * self.dim + feature]
    }

    fn leaf(&self, samples: &[usize]) -> RegressionNode {
        let sum: f64 = samples.iter().map(|&i| self.y[i]).sum();
        RegressionNode::Leaf(RegressionLeaf {
            value: if samples.is_empty() { 0.0 } else { sum / samples.len() as f64 },
            n_samples: samples.len(),
        })
    }

    fn build(&self, samples: &mut [usize], depth: usize) -> RegressionNode {
        let n = samples.len();
        if n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
            || depth >= self.params.max_depth.map_or(MAX_TREE_DEPTH, |max| max.min(MAX_TREE_DEPTH))
        {
            return self.leaf(samples);
        }

        let Some(best) = self.best_split(samples) else {
            return self.leaf(samples);
        };

        samples.sort_unstable_by(|&a, &b| self.value(a, best.feature).total_cmp(&self.value(b, best.feature)));
        let (left, right) = samples.split_at_mut(best.left_len);

        RegressionNode::Split(RegressionSplit {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.build(left, depth + 1)),
            right: Box::new(self.build(right, depth + 1)),
        })
    }

    /// Maximizes `sum_l^2 / n_l + sum_r^2 / n_r`, which is equivalent to
    /// minimizing the summed squared error of both children.
    fn best_split(&self, samples: &mut [usize]) -> Option<SplitCandidate> {
        let n = samples.len();
        let total: f64 = samples.iter().map(|&i| self.y[i]).sum();
        let parent_score = total * total / n as f64;
        let min_leaf = self.params.min_samples_leaf.max(1);

        let mut best: Option<SplitCandidate> = None;

        for feature in 0..self.dim {
            samples.sort_unstable_by(|&a, &b| self.value(a, feature).total_cmp(&self.value(b, feature)));

            let mut left_sum = 0.0;
            for i in 1..n {
                left_sum += self.y[samples[i - 1]];
                let prev = self.value(samples[i - 1], feature);
                let next = self.value(samples[i], feature);
                if prev == next || i < min_leaf || n - i < min_leaf {
                    continue;
                }

                let right_sum = total - left_sum;
                let score = left_sum * left_sum / i as f64 + right_sum * right_sum / (n - i) as f64;
                let improves = score > parent_score * (1.0 + 1e-12) + 1e-12;
                if improves && best.as_ref().map_or(true, |b| score > b.score) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: prev + (next - prev) / 2.0,
                        left_len: i,
                        score,
                    });
                }
            }
        }

        best
    }
}

/// Single CART regression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    root: RegressionNode,
    n_features: usize,
}

impl DecisionTreeRegressor {
    /// Grow a tree over the given sample indices (duplicates allowed)
    fn grow(x: &[f64], y: &[f64], dim: usize, mut samples: Vec<usize>, params: TreeParams) -> Self {
        let builder = TreeBuilder { x, y, dim, params };
        Self {
            root: builder.build(&mut samples, 0),
            n_features: dim,
        }
    }

    pub fn fit(x: &[f64], y: &[f64], dim: usize, params: TreeParams) -> Result<Self> {
        validate_training_data(x, y, dim)?;
        Ok(Self::grow(x, y, dim, (0..y.len()).collect(), params))
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.n_features {
            return Err(Error::InvalidDimension {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        Ok(self.root.predict(row))
    }
}

/// Random forest regressor: mean prediction of bootstrap-trained trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<DecisionTreeRegressor>,
    n_estimators: usize,
    params: TreeParams,
    seed: u64,
    n_features: usize,
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            params: TreeParams::default(),
            seed: 42,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.params.max_depth = Some(max_depth);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.params.min_samples_leaf = min_samples_leaf.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> &[DecisionTreeRegressor] {
        &self.trees
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Fit on a row-major matrix `x` with `dim` columns and targets `y`
    pub fn fit(&mut self, x: &[f64], y: &[f64], dim: usize) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(Error::InvalidConfig("n_estimators must be positive".to_string()));
        }
        validate_training_data(x, y, dim)?;

        let n_samples = y.len();
        let params = self.params;
        let seed = self.seed;

        self.trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
                let bootstrap: Vec<usize> = (0..n_samples).map(|_| rng.random_range(0..n_samples)).collect();
                DecisionTreeRegressor::grow(x, y, dim, bootstrap, params)
            })
            .collect();
        self.n_features = dim;

        Ok(())
    }

    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if !self.is_fitted() {
            return Err(Error::ModelNotTrained);
        }
        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.predict_row(row)?;
        }
        Ok(sum / self.trees.len() as f64)
    }

    /// Predict every row of a row-major matrix
    pub fn predict(&self, x: &[f64]) -> Result<Vec<f64>> {
        if self.n_features == 0 {
            return Err(Error::ModelNotTrained);
        }
        x.chunks(self.n_features).map(|row| self.predict_row(row)).collect()
    }
}

fn validate_training_data(x: &[f64], y: &[f64], dim: usize) -> Result<()> {
    if dim == 0 {
        return Err(Error::InvalidConfig("feature dimension must be positive".to_string()));
    }
    if y.is_empty() {
        return Err(Error::EmptyDataset);
    }
    if x.len() != y.len() * dim {
        return Err(Error::InvalidDimension {
            expected: y.len() * dim,
            actual: x.len(),
        });
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(Error::InvalidInput("training data contains non-finite values".to_string()));
    }
    Ok(())
}
