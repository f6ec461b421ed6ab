//! Tree ensemble inference (gradient boosting and random forests).
//!
//! Trees use the flat parallel-array layout exported by common training
//! libraries: node `i` splits on `features[i]` at `thresholds[i]`, samples
//! with `x <= threshold` go to `left[i]`, others to `right[i]`, and a
//! negative feature index marks a leaf whose output is `values[i]`.
//!
//! Structure is checked once at load time ([`RegressionTree::validate`]), so
//! traversal needs no bounds handling and always terminates.

use serde::{Deserialize, Serialize};
use sharko_core::{Link, Predictor};

/// A regression tree in flat-array form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub features: Vec<i32>,
    pub thresholds: Vec<f64>,
    pub left: Vec<i32>,
    pub right: Vec<i32>,
    pub values: Vec<f64>,
}

impl RegressionTree {
    /// Build from parallel arrays.
    pub fn from_arrays(
        features: Vec<i32>,
        thresholds: Vec<f64>,
        left: Vec<i32>,
        right: Vec<i32>,
        values: Vec<f64>,
    ) -> Self {
        Self {
            features,
            thresholds,
            left,
            right,
            values,
        }
    }

    /// A single-leaf tree.
    pub fn leaf(value: f64) -> Self {
        Self::from_arrays(vec![-2], vec![-2.0], vec![-1], vec![-1], vec![value])
    }

    /// A depth-1 tree: `x[feature] <= threshold ? low : high`.
    pub fn stump(feature: i32, threshold: f64, low: f64, high: f64) -> Self {
        Self::from_arrays(
            vec![feature, -2, -2],
            vec![threshold, -2.0, -2.0],
            vec![1, -1, -1],
            vec![2, -1, -1],
            vec![0.0, low, high],
        )
    }

    /// Number of nodes.
    pub fn n_nodes(&self) -> usize {
        self.features.len()
    }

    /// Check array lengths, child links, and feature indices.
    ///
    /// Children must point strictly forward, which rules out cycles.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        let n = self.features.len();
        if n == 0 {
            return Err("tree has no nodes".into());
        }
        if self.thresholds.len() != n
            || self.left.len() != n
            || self.right.len() != n
            || self.values.len() != n
        {
            return Err("inconsistent array lengths".into());
        }

        for i in 0..n {
            let feature = self.features[i];
            if feature < 0 {
                if !self.values[i].is_finite() {
                    return Err(format!("leaf {i} has a non-finite value"));
                }
                continue;
            }
            if feature as usize >= n_features {
                return Err(format!(
                    "node {i} splits on feature {feature}, model has {n_features}"
                ));
            }
            if self.thresholds[i].is_nan() {
                return Err(format!("node {i} has a NaN threshold"));
            }
            for child in [self.left[i], self.right[i]] {
                if child <= i as i32 || child as usize >= n {
                    return Err(format!("node {i} has invalid child link {child}"));
                }
            }
        }
        Ok(())
    }

    /// Output for a single sample.
    #[allow(clippy::cast_sign_loss)]
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            let feature = self.features[idx];
            if feature < 0 {
                return self.values[idx];
            }
            let value = features.get(feature as usize).copied().unwrap_or(0.0);
            idx = if value <= self.thresholds[idx] {
                self.left[idx] as usize
            } else {
                self.right[idx] as usize
            };
        }
    }

    /// Longest root-to-leaf path.
    #[allow(clippy::cast_sign_loss)]
    pub fn depth(&self) -> usize {
        fn walk(tree: &RegressionTree, idx: usize) -> usize {
            if tree.features[idx] < 0 {
                return 0;
            }
            let l = walk(tree, tree.left[idx] as usize);
            let r = walk(tree, tree.right[idx] as usize);
            1 + l.max(r)
        }
        if self.features.is_empty() {
            0
        } else {
            walk(self, 0)
        }
    }
}

/// How tree outputs are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Boosting: `base_score + learning_rate * Σ tree(x)`.
    #[default]
    Sum,
    /// Bagging: `base_score + mean(tree(x))`.
    Mean,
}

/// An ensemble of regression trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub n_features: usize,
    pub trees: Vec<RegressionTree>,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub base_score: f64,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default)]
    pub link: Link,
}

fn default_learning_rate() -> f64 {
    1.0
}

impl TreeEnsemble {
    /// Gradient-boosted ensemble.
    pub fn boosted(
        n_features: usize,
        trees: Vec<RegressionTree>,
        base_score: f64,
        learning_rate: f64,
    ) -> Self {
        Self {
            n_features,
            trees,
            aggregation: Aggregation::Sum,
            base_score,
            learning_rate,
            link: Link::Identity,
        }
    }

    /// Random-forest style averaging ensemble.
    pub fn forest(n_features: usize, trees: Vec<RegressionTree>) -> Self {
        Self {
            n_features,
            trees,
            aggregation: Aggregation::Mean,
            base_score: 0.0,
            learning_rate: 1.0,
            link: Link::Identity,
        }
    }

    /// Set the link function.
    pub fn with_link(mut self, link: Link) -> Self {
        self.link = link;
        self
    }

    /// Validate every tree and the ensemble parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.n_features == 0 {
            return Err("ensemble declares zero features".into());
        }
        if self.trees.is_empty() {
            return Err("ensemble has no trees".into());
        }
        if !self.base_score.is_finite() || !self.learning_rate.is_finite() {
            return Err("ensemble has non-finite parameters".into());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| format!("tree {i}: {e}"))?;
        }
        Ok(())
    }

    /// Number of trees.
    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }
}

impl Predictor for TreeEnsemble {
    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn predict_raw(&self, features: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        match self.aggregation {
            Aggregation::Sum => self.base_score + self.learning_rate * total,
            Aggregation::Mean => self.base_score + total / self.trees.len().max(1) as f64,
        }
    }

    fn link(&self) -> Link {
        self.link
    }

    fn describe(&self) -> String {
        format!(
            "tree_ensemble({} trees, {:?}, {:?} link)",
            self.trees.len(),
            self.aggregation,
            self.link
        )
    }
}
