//! Named, ordered feature vectors.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Base feature: latitude in decimal degrees.
pub const LATITUDE: &str = "lat";
/// Base feature: longitude in decimal degrees.
pub const LONGITUDE: &str = "lon";
/// Base feature: sine of the day-of-year angle.
pub const DAY_SIN: &str = "day_sin";
/// Base feature: cosine of the day-of-year angle.
pub const DAY_COS: &str = "day_cos";

/// Features produced by the encoder, in encoding order.
pub const BASE_FEATURES: [&str; 4] = [LATITUDE, LONGITUDE, DAY_SIN, DAY_COS];

/// Ordered mapping from feature name to value.
///
/// Grows monotonically through a cascade run: names are only ever appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: IndexMap<String, f64>,
}

impl FeatureVector {
    /// Create an empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with room for `capacity` features.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: IndexMap::with_capacity(capacity),
        }
    }

    /// Append a feature. Fails if the name is already present, since a
    /// value computed once must never be silently replaced.
    pub fn append(&mut self, stage: &'static str, name: impl Into<String>, value: f64) -> Result<()> {
        let name = name.into();
        if self.values.contains_key(&name) {
            return Err(Error::corrupt(
                stage,
                format!("feature {name:?} would be produced twice"),
            ));
        }
        self.values.insert(name, value);
        Ok(())
    }

    /// Look up a feature by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Check whether a feature is present.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Select `names` in the given order.
    ///
    /// Reports every missing name, not just the first.
    pub fn select<S: AsRef<str>>(&self, stage: &'static str, names: &[S]) -> Result<Vec<f64>> {
        let mut selected = Vec::with_capacity(names.len());
        let mut missing = Vec::new();

        for name in names {
            match self.values.get(name.as_ref()) {
                Some(value) => selected.push(*value),
                None => missing.push(name.as_ref().to_string()),
            }
        }

        if missing.is_empty() {
            Ok(selected)
        } else {
            Err(Error::feature_mismatch(stage, missing))
        }
    }

    /// Feature names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
