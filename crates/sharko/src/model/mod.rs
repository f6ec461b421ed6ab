//! Model families that artifact bundles can carry.

mod linear;
mod scaler;
mod tree;

use serde::{Deserialize, Serialize};
use sharko_core::{Link, Predictor};

pub use linear::LinearModel;
pub use scaler::{within_roundtrip_tolerance, Scaler, SCALER_ROUNDTRIP_TOLERANCE};
pub use tree::{Aggregation, RegressionTree, TreeEnsemble};

/// A serialized model of any supported family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSpec {
    Linear(LinearModel),
    TreeEnsemble(TreeEnsemble),
}

impl ModelSpec {
    /// Structural validation performed once at load time.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ModelSpec::Linear(m) => m.validate(),
            ModelSpec::TreeEnsemble(m) => m.validate(),
        }
    }
}

impl Predictor for ModelSpec {
    fn n_features(&self) -> Option<usize> {
        match self {
            ModelSpec::Linear(m) => m.n_features(),
            ModelSpec::TreeEnsemble(m) => m.n_features(),
        }
    }

    fn predict_raw(&self, features: &[f64]) -> f64 {
        match self {
            ModelSpec::Linear(m) => m.predict_raw(features),
            ModelSpec::TreeEnsemble(m) => m.predict_raw(features),
        }
    }

    fn link(&self) -> Link {
        match self {
            ModelSpec::Linear(m) => m.link(),
            ModelSpec::TreeEnsemble(m) => m.link(),
        }
    }

    fn describe(&self) -> String {
        match self {
            ModelSpec::Linear(m) => m.describe(),
            ModelSpec::TreeEnsemble(m) => m.describe(),
        }
    }
}
