// Lattice index <-> coordinate conversions are intentional
#![allow(clippy::cast_precision_loss)]

//! # Sharko
//!
//! Cascading environmental forecasts feeding a species habitat classifier.
//!
//! For a point and a date, Sharko forecasts sea surface temperature, sea
//! surface height anomaly, and chlorophyll-a, then classifies how likely the
//! target species is to be present given those conditions. Each forecast is
//! an input to the next.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    ┌────────────────┐    ┌──────────────────────────────────┐
//! │ GridSpec /   │───►│ FeatureEncoder │───►│ CascadeOrchestrator              │
//! │ PointRequest │    │ lat lon sin cos│    │  SST -> SSHA -> Chl -> Habitat   │
//! └──────────────┘    └────────────────┘    └────────────────┬─────────────────┘
//!         ▲                                                  │
//!         │            ┌───────────────┐                     ▼
//!   BatchRunner ◄──────│ ModelRegistry │            CascadeResult / SurfaceCell
//!   (rayon pool)       │ (load once)   │
//!                      └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use sharko::prelude::*;
//!
//! let registry = ModelRegistry::open("models", "latest")?;
//! let cascade = CascadeOrchestrator::from_registry(&registry, FeatureEncoder::default())?;
//!
//! let point = QueryPoint::parse(10.0, -40.0, "2025-05-15")?;
//! let result = cascade.run(&point)?;
//! println!("p(presence) = {:.3}", result.habitat_probability);
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel` - Run batches on a rayon thread pool (default)

pub mod artifact;
pub mod batch;
pub mod cascade;
pub mod config;
pub mod encoder;
pub mod grid;
pub mod habitat;
pub mod inference;
pub mod model;
pub mod registry;
pub mod stage;

pub use artifact::{Artifact, ArtifactBundle, ArtifactEncoding, Model, ARTIFACT_FORMAT_VERSION};
pub use batch::{
    BatchConfig, BatchReport, BatchRunner, BatchStats, CancellationToken, PointOutcome,
    PointStatus,
};
pub use cascade::{CascadeOrchestrator, CascadePlan};
pub use config::SharkoConfig;
pub use encoder::{cyclical_day, FeatureEncoder, DEFAULT_DAY_PERIOD};
pub use grid::{GridIter, GridSpec, MAX_GRID_POINTS};
pub use habitat::HabitatClassifier;
pub use inference::{
    CascadeInput, InferenceEngine, InferenceRequest, InferenceResponse, PointFailure,
    PointRequest, SurfaceCell,
};
pub use model::{
    within_roundtrip_tolerance, Aggregation, LinearModel, ModelSpec, RegressionTree, Scaler,
    TreeEnsemble, SCALER_ROUNDTRIP_TOLERANCE,
};
pub use registry::{
    ArtifactSource, ArtifactSummary, DirectorySource, MemorySource, ModelRegistry, LATEST_VERSION,
};
pub use stage::{RegressionStage, StageDescriptor};

pub use sharko_core::{
    parse_date, CascadeResult, Coordinate, Error, FeatureVector, Link, Predictor, QueryPoint,
    Region, Result, StageKind, ValueScaler,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        Artifact, BatchRunner, CascadeOrchestrator, CascadeResult, Coordinate, Error,
        FeatureEncoder, GridSpec, InferenceEngine, ModelRegistry, QueryPoint, Region, Result,
        SharkoConfig, StageKind,
    };
}
