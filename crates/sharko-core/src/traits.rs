//! Core traits for model artifacts.
//!
//! ## Seams
//!
//! ```text
//! Predictor    (feature slice -> raw output, plus link)
//! ValueScaler  (target-space <-> model-space remapping)
//! ```
//!
//! Concrete model families live in the `sharko` crate; tests plug in
//! deterministic stubs through the same traits.

use core::fmt::Debug;

use crate::error::Result;
use crate::types::Link;

/// A trained, immutable model.
///
/// Implementations must be pure: the same input always yields the same
/// output, and `predict_raw` never panics for inputs of the declared width.
pub trait Predictor: Send + Sync + Debug {
    /// Number of input features the model was trained on, if known.
    fn n_features(&self) -> Option<usize> {
        None
    }

    /// Raw model output (a value for regressors, a margin or probability for
    /// classifiers depending on [`Predictor::link`]).
    fn predict_raw(&self, features: &[f64]) -> f64;

    /// Link function that maps the raw output to the reported value.
    fn link(&self) -> Link {
        Link::Identity
    }

    /// Raw output with the link applied.
    fn predict(&self, features: &[f64]) -> f64 {
        self.link().apply(self.predict_raw(features))
    }

    /// Short description for logs.
    fn describe(&self) -> String {
        format!("{self:?}")
    }
}

/// A monotonic value remapping fit alongside a model.
pub trait ValueScaler: Send + Sync + Debug {
    /// Map a value into model space.
    fn transform(&self, value: f64) -> f64;

    /// Map a model-space value back to the original units.
    fn inverse_transform(&self, value: f64) -> f64;

    /// Check that the fitted parameters are usable.
    fn validate(&self) -> Result<()>;
}
