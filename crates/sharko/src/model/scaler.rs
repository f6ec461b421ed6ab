//! Fitted value scalers persisted next to a model.
//!
//! The SSHA regressor is trained on robust-scaled targets, so its raw output
//! lives in scaled space and must be mapped back with
//! [`ValueScaler::inverse_transform`].

use serde::{Deserialize, Serialize};
use sharko_core::{Error, Result, StageKind, ValueScaler};

/// Relative tolerance for `inverse_transform(transform(x)) == x` inside the
/// fit range. An absolute floor of the same size applies near zero.
pub const SCALER_ROUNDTRIP_TOLERANCE: f64 = 1e-9;

/// Check a round-trip value against [`SCALER_ROUNDTRIP_TOLERANCE`].
pub fn within_roundtrip_tolerance(original: f64, recovered: f64) -> bool {
    let scale = original.abs().max(1.0);
    (original - recovered).abs() <= SCALER_ROUNDTRIP_TOLERANCE * scale
}

/// Fitted scaler variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scaler {
    /// `(x - center) / scale`, with `x` clipped to `clip` first.
    ///
    /// `center` is the fit median and `scale` the interquartile range. The
    /// clip bounds are fit-time quantiles of the target; values beyond them
    /// do not survive a round trip.
    Robust {
        center: f64,
        scale: f64,
        #[serde(default)]
        clip: Option<[f64; 2]>,
    },
    /// `(x - mean) / std`.
    Standard { mean: f64, std: f64 },
    /// `(x - min) / (max - min)`.
    MinMax { min: f64, max: f64 },
}

impl Scaler {
    /// Robust scaler without clipping.
    pub fn robust(center: f64, scale: f64) -> Self {
        Scaler::Robust {
            center,
            scale,
            clip: None,
        }
    }

    /// Robust scaler clipped to `[low, high]` in original units.
    pub fn robust_clipped(center: f64, scale: f64, low: f64, high: f64) -> Self {
        Scaler::Robust {
            center,
            scale,
            clip: Some([low, high]),
        }
    }

    /// Original-unit range in which round trips are exact (up to tolerance).
    pub fn exact_range(&self) -> (f64, f64) {
        match self {
            Scaler::Robust {
                clip: Some([low, high]),
                ..
            } => (*low, *high),
            _ => (f64::NEG_INFINITY, f64::INFINITY),
        }
    }

    fn offset_and_span(&self) -> (f64, f64) {
        match *self {
            Scaler::Robust { center, scale, .. } => (center, scale),
            Scaler::Standard { mean, std } => (mean, std),
            Scaler::MinMax { min, max } => (min, max - min),
        }
    }
}

impl ValueScaler for Scaler {
    fn transform(&self, value: f64) -> f64 {
        let value = match self {
            Scaler::Robust {
                clip: Some([low, high]),
                ..
            } => value.clamp(*low, *high),
            _ => value,
        };
        let (offset, span) = self.offset_and_span();
        (value - offset) / span
    }

    fn inverse_transform(&self, value: f64) -> f64 {
        let (offset, span) = self.offset_and_span();
        value * span + offset
    }

    fn validate(&self) -> Result<()> {
        let name = StageKind::Ssha.name();
        let (offset, span) = self.offset_and_span();
        if !offset.is_finite() || !span.is_finite() {
            return Err(Error::corrupt(name, "scaler has non-finite parameters"));
        }
        if span <= 0.0 {
            return Err(Error::corrupt(
                name,
                format!("scaler span must be positive, got {span}"),
            ));
        }
        if let Scaler::Robust {
            clip: Some([low, high]),
            ..
        } = self
        {
            if !low.is_finite() || !high.is_finite() || low >= high {
                return Err(Error::corrupt(
                    name,
                    format!("scaler clip bounds [{low}, {high}] are not an interval"),
                ));
            }
        }
        Ok(())
    }
}
