//! Linear and logistic regression.

use serde::{Deserialize, Serialize};
use sharko_core::{Link, Predictor};

/// `intercept + Σ coefficients[i] * x[i]`, optionally passed through a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub link: Link,
}

impl LinearModel {
    /// Create a linear regressor.
    pub fn new(intercept: f64, coefficients: Vec<f64>) -> Self {
        Self {
            intercept,
            coefficients,
            link: Link::Identity,
        }
    }

    /// Create a logistic classifier (raw output is the log-odds margin).
    pub fn logistic(intercept: f64, coefficients: Vec<f64>) -> Self {
        Self {
            intercept,
            coefficients,
            link: Link::Logistic,
        }
    }

    /// Check that all parameters are finite.
    pub fn validate(&self) -> Result<(), String> {
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err("linear model has non-finite parameters".into());
        }
        if self.coefficients.is_empty() {
            return Err("linear model has no coefficients".into());
        }
        Ok(())
    }
}

impl Predictor for LinearModel {
    fn n_features(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }

    fn predict_raw(&self, features: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(features)
            .fold(self.intercept, |acc, (w, x)| acc + w * x)
    }

    fn link(&self) -> Link {
        self.link
    }

    fn describe(&self) -> String {
        format!(
            "linear({} features, {:?} link)",
            self.coefficients.len(),
            self.link
        )
    }
}
