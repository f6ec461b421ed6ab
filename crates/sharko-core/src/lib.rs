//! # Sharko Core
//!
//! Core types, errors, and model traits for the Sharko habitat cascade.
//!
//! Sharko predicts where a species is likely to be present by chaining three
//! environmental forecasts (sea surface temperature, sea surface height
//! anomaly, chlorophyll-a) into a presence classifier. This crate holds the
//! pieces every stage agrees on.
//!
//! ## Core Types
//!
//! - [`Coordinate`] / [`QueryPoint`] - where and when to forecast
//! - [`FeatureVector`] - ordered, append-only named features
//! - [`StageKind`] - the four cascade stages in execution order
//! - [`CascadeResult`] - per-point output
//!
//! ## Core Traits
//!
//! - [`Predictor`] - a trained model
//! - [`ValueScaler`] - a fitted target remapping

pub mod error;
pub mod features;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use features::{FeatureVector, BASE_FEATURES, DAY_COS, DAY_SIN, LATITUDE, LONGITUDE};
pub use traits::{Predictor, ValueScaler};
pub use types::{
    parse_date, sigmoid, CascadeResult, Coordinate, Link, QueryPoint, Region, StageKind,
    DATE_FORMAT, LATITUDE_RANGE, LONGITUDE_RANGE,
};
