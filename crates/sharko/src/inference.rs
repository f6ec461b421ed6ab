//! Inference requests, responses, and the engine that serves them.
//!
//! ## Modes
//!
//! ```text
//! Grid   { region, resolution, date } -> cells (lat, lon, probability) + failures
//! Points { [ {latitude, longitude, date} ] } -> full cascade results + failures
//! ```
//!
//! Both responses serialize to JSON for presentation layers.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sharko_core::{parse_date, CascadeResult, Coordinate, QueryPoint, Region, Result, DATE_FORMAT};
use tracing::info;

use crate::batch::{BatchRunner, BatchStats, CancellationToken};
use crate::cascade::CascadeOrchestrator;
use crate::config::SharkoConfig;
use crate::grid::GridSpec;
use crate::registry::ModelRegistry;

/// A raw point as received from a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// `YYYY-MM-DD`.
    pub date: String,
}

impl PointRequest {
    /// Create a point request.
    pub fn new(latitude: f64, longitude: f64, date: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            date: date.into(),
        }
    }
}

impl fmt::Display for PointRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {}",
            Coordinate::new(self.latitude, self.longitude),
            self.date
        )
    }
}

impl From<&QueryPoint> for PointRequest {
    fn from(point: &QueryPoint) -> Self {
        Self::new(
            point.coordinate.latitude,
            point.coordinate.longitude,
            point.date.format(DATE_FORMAT).to_string(),
        )
    }
}

/// Anything the batch runner can turn into a query point.
///
/// Resolution happens inside the per-point task so that unparseable input
/// fails only its own point.
pub trait CascadeInput: Sync {
    /// Resolve into a query point.
    fn query_point(&self) -> Result<QueryPoint>;

    /// The input as reported back to callers.
    fn request(&self) -> PointRequest;
}

impl<T: CascadeInput + ?Sized> CascadeInput for &T {
    fn query_point(&self) -> Result<QueryPoint> {
        (**self).query_point()
    }

    fn request(&self) -> PointRequest {
        (**self).request()
    }
}

impl CascadeInput for QueryPoint {
    fn query_point(&self) -> Result<QueryPoint> {
        Ok(*self)
    }

    fn request(&self) -> PointRequest {
        PointRequest::from(self)
    }
}

impl CascadeInput for PointRequest {
    fn query_point(&self) -> Result<QueryPoint> {
        QueryPoint::parse(self.latitude, self.longitude, &self.date)
    }

    fn request(&self) -> PointRequest {
        self.clone()
    }
}

/// One cell of a probability surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceCell {
    pub latitude: f64,
    pub longitude: f64,
    pub habitat_probability: f64,
}

impl From<&CascadeResult> for SurfaceCell {
    fn from(result: &CascadeResult) -> Self {
        Self {
            latitude: result.point.coordinate.latitude,
            longitude: result.point.coordinate.longitude,
            habitat_probability: result.habitat_probability,
        }
    }
}

/// A point that did not produce a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointFailure {
    /// Position in the input.
    pub index: usize,
    pub point: PointRequest,
    /// Stable error category, or `cancelled`.
    pub category: String,
    pub message: String,
}

/// An inference request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InferenceRequest {
    Grid {
        region: Region,
        resolution: f64,
        date: String,
    },
    Points {
        points: Vec<PointRequest>,
    },
}

/// An inference response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InferenceResponse {
    Grid {
        date: String,
        resolution: f64,
        cells: Vec<SurfaceCell>,
        failures: Vec<PointFailure>,
        stats: BatchStats,
    },
    Points {
        results: Vec<CascadeResult>,
        failures: Vec<PointFailure>,
        stats: BatchStats,
    },
}

impl InferenceResponse {
    /// Batch statistics for either mode.
    pub fn stats(&self) -> &BatchStats {
        match self {
            InferenceResponse::Grid { stats, .. } | InferenceResponse::Points { stats, .. } => {
                stats
            }
        }
    }

    /// Per-point failures for either mode.
    pub fn failures(&self) -> &[PointFailure] {
        match self {
            InferenceResponse::Grid { failures, .. }
            | InferenceResponse::Points { failures, .. } => failures,
        }
    }
}

/// Serves inference requests with a loaded cascade.
#[derive(Debug)]
pub struct InferenceEngine {
    registry: Arc<ModelRegistry>,
    orchestrator: CascadeOrchestrator,
    runner: BatchRunner,
}

impl InferenceEngine {
    /// Build an engine from a registry, loading all artifacts up front.
    pub fn new(registry: Arc<ModelRegistry>, config: &SharkoConfig) -> Result<Self> {
        registry.preload()?;
        let orchestrator = CascadeOrchestrator::from_registry(&registry, config.encoder()?)?;
        let runner = BatchRunner::new(config.batch_config())?;
        Ok(Self {
            registry,
            orchestrator,
            runner,
        })
    }

    /// Build an engine from configuration alone.
    pub fn from_config(config: &SharkoConfig) -> Result<Self> {
        config.validate()?;
        let registry = ModelRegistry::open(&config.model_dir, &config.model_version)?;
        Self::new(Arc::new(registry), config)
    }

    /// The registry artifacts were loaded from.
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// The cascade used for every point.
    pub fn orchestrator(&self) -> &CascadeOrchestrator {
        &self.orchestrator
    }

    /// The batch runner.
    pub fn runner(&self) -> &BatchRunner {
        &self.runner
    }

    /// Serve one request.
    pub fn handle(&self, request: &InferenceRequest) -> Result<InferenceResponse> {
        self.handle_with_cancel(request, &CancellationToken::new())
    }

    /// Serve one request, stopping new points once `cancel` fires.
    pub fn handle_with_cancel(
        &self,
        request: &InferenceRequest,
        cancel: &CancellationToken,
    ) -> Result<InferenceResponse> {
        match request {
            InferenceRequest::Grid {
                region,
                resolution,
                date,
            } => {
                let grid = GridSpec::new(*region, *resolution, parse_date(date)?)?;
                info!(
                    "Grid request: {} x {} points at {} degrees on {}",
                    grid.latitude_steps(),
                    grid.longitude_steps(),
                    resolution,
                    date
                );
                let report = self
                    .runner
                    .run_grid_with_cancel(&self.orchestrator, &grid, cancel)?;
                Ok(InferenceResponse::Grid {
                    date: grid.date.format(DATE_FORMAT).to_string(),
                    resolution: *resolution,
                    cells: report.surface(),
                    failures: report.failure_records(),
                    stats: report.stats,
                })
            }
            InferenceRequest::Points { points } => {
                info!("Point request: {} points", points.len());
                let report = self
                    .runner
                    .run_with_cancel(&self.orchestrator, points, cancel)?;
                Ok(InferenceResponse::Points {
                    results: report.results().copied().collect(),
                    failures: report.failure_records(),
                    stats: report.stats,
                })
            }
        }
    }
}
