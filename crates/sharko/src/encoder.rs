//! Base feature encoding for query points.

use std::f64::consts::TAU;

use sharko_core::{
    Error, FeatureVector, QueryPoint, Result, BASE_FEATURES, DAY_COS, DAY_SIN, LATITUDE, LONGITUDE,
};

/// Default period of the day-of-year cycle, in days.
pub const DEFAULT_DAY_PERIOD: f64 = 365.25;

/// Project a day-of-year onto the unit circle: `(sin, cos)` of `2π·doy/period`.
pub fn cyclical_day(day_of_year: f64, period: f64) -> (f64, f64) {
    let angle = TAU * day_of_year / period;
    (angle.sin(), angle.cos())
}

/// Encodes a query point into the base feature vector
/// `[lat, lon, day_sin, day_cos]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureEncoder {
    period: f64,
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self {
            period: DEFAULT_DAY_PERIOD,
        }
    }
}

impl FeatureEncoder {
    /// Create an encoder with a custom day period.
    pub fn with_period(period: f64) -> Result<Self> {
        if !period.is_finite() || period <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "day period must be a positive number of days, got {period}"
            )));
        }
        Ok(Self { period })
    }

    /// Day-of-year cycle period in days.
    pub fn period(&self) -> f64 {
        self.period
    }

    /// Names produced by [`FeatureEncoder::encode`], in order.
    pub fn feature_names(&self) -> &'static [&'static str] {
        &BASE_FEATURES
    }

    /// Encode a point, rejecting out-of-range coordinates.
    pub fn encode(&self, point: &QueryPoint) -> Result<FeatureVector> {
        point.coordinate.validate()?;
        let (day_sin, day_cos) = cyclical_day(f64::from(point.day_of_year()), self.period);

        let mut features = FeatureVector::with_capacity(8);
        features.append("encoder", LATITUDE, point.coordinate.latitude)?;
        features.append("encoder", LONGITUDE, point.coordinate.longitude)?;
        features.append("encoder", DAY_SIN, day_sin)?;
        features.append("encoder", DAY_COS, day_cos)?;
        Ok(features)
    }
}
