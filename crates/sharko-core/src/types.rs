//! Core types for the habitat cascade.

use core::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Valid latitude range in degrees.
pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);

/// Valid longitude range in degrees.
pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

/// Date format accepted in requests and point files.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A geographic position in decimal degrees.
///
/// Constructing a coordinate does not range-check it; raw input is carried
/// as-is and rejected by [`Coordinate::validate`] when features are built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check both components against their valid ranges.
    pub fn validate(&self) -> Result<()> {
        let lat_ok = self.latitude.is_finite()
            && (LATITUDE_RANGE.0..=LATITUDE_RANGE.1).contains(&self.latitude);
        let lon_ok = self.longitude.is_finite()
            && (LONGITUDE_RANGE.0..=LONGITUDE_RANGE.1).contains(&self.longitude);

        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(Error::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

/// A coordinate paired with the calendar date to forecast for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryPoint {
    pub coordinate: Coordinate,
    pub date: NaiveDate,
}

impl QueryPoint {
    /// Create a query point.
    pub const fn new(coordinate: Coordinate, date: NaiveDate) -> Self {
        Self { coordinate, date }
    }

    /// Create a query point from a `YYYY-MM-DD` date string.
    pub fn parse(latitude: f64, longitude: f64, date: &str) -> Result<Self> {
        Ok(Self::new(Coordinate::new(latitude, longitude), parse_date(date)?))
    }

    /// 1-based ordinal day of the year (1..=366).
    pub fn day_of_year(&self) -> u32 {
        self.date.ordinal()
    }
}

impl fmt::Display for QueryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.coordinate, self.date.format(DATE_FORMAT))
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|e| Error::InvalidDate(format!("{value:?}: {e}")))
}

/// The four cascade stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Sea surface temperature regressor.
    Sst,
    /// Sea surface height anomaly regressor (trained on scaled targets).
    Ssha,
    /// Chlorophyll-a concentration regressor.
    Chlorophyll,
    /// Presence/absence classifier.
    Habitat,
}

impl StageKind {
    /// All stages in cascade order.
    pub const ALL: [StageKind; 4] = [
        StageKind::Sst,
        StageKind::Ssha,
        StageKind::Chlorophyll,
        StageKind::Habitat,
    ];

    /// Logical artifact name used in model storage.
    pub const fn name(self) -> &'static str {
        match self {
            StageKind::Sst => "sst",
            StageKind::Ssha => "ssha",
            StageKind::Chlorophyll => "chlorophyll",
            StageKind::Habitat => "habitat",
        }
    }

    /// Position in the cascade (0-based).
    pub const fn index(self) -> usize {
        match self {
            StageKind::Sst => 0,
            StageKind::Ssha => 1,
            StageKind::Chlorophyll => 2,
            StageKind::Habitat => 3,
        }
    }

    /// Feature name the stage output is appended under, unless the artifact
    /// declares its own.
    pub const fn default_output_feature(self) -> Option<&'static str> {
        match self {
            StageKind::Sst => Some("predicted_sst"),
            StageKind::Ssha => Some("predicted_ssha"),
            StageKind::Chlorophyll => Some("predicted_chlorophyll"),
            StageKind::Habitat => None,
        }
    }

    /// Whether the stage's artifact must carry a paired value scaler.
    pub const fn requires_scaler(self) -> bool {
        matches!(self, StageKind::Ssha)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sst" => Ok(StageKind::Sst),
            "ssha" | "ssh" => Ok(StageKind::Ssha),
            "chlorophyll" | "chlor_a" | "chl" => Ok(StageKind::Chlorophyll),
            "habitat" | "presence" => Ok(StageKind::Habitat),
            other => Err(Error::not_found(other, None)),
        }
    }
}

/// Link function mapping a model's raw output to its reported value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    /// Raw output is the value.
    #[default]
    Identity,
    /// Raw output is a log-odds margin.
    Logistic,
}

impl Link {
    /// Apply the link to a raw model output.
    pub fn apply(self, raw: f64) -> f64 {
        match self {
            Link::Identity => raw,
            Link::Logistic => sigmoid(raw),
        }
    }
}

/// Logistic sigmoid, stable for large negative inputs.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Rectangular region in decimal degrees (inclusive bounds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl Region {
    /// Create a region from its bounds.
    pub const fn new(
        min_latitude: f64,
        max_latitude: f64,
        min_longitude: f64,
        max_longitude: f64,
    ) -> Self {
        Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        }
    }

    /// Check that the bounds are finite, ordered, and on the globe.
    pub fn validate(&self) -> Result<()> {
        let bounds = [
            self.min_latitude,
            self.max_latitude,
            self.min_longitude,
            self.max_longitude,
        ];
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(Error::InvalidRegion("bounds must be finite".into()));
        }
        if self.min_latitude > self.max_latitude || self.min_longitude > self.max_longitude {
            return Err(Error::InvalidRegion(format!(
                "min bound exceeds max bound: {self:?}"
            )));
        }
        Coordinate::new(self.min_latitude, self.min_longitude)
            .validate()
            .and_then(|()| Coordinate::new(self.max_latitude, self.max_longitude).validate())
            .map_err(|_| Error::InvalidRegion(format!("bounds outside the globe: {self:?}")))
    }

    /// Check whether a coordinate lies inside the region.
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&coordinate.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&coordinate.longitude)
    }
}

/// Output of one cascade run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CascadeResult {
    pub point: QueryPoint,
    pub predicted_sst: f64,
    pub predicted_ssha: f64,
    pub predicted_chlorophyll: f64,
    pub habitat_probability: f64,
}
