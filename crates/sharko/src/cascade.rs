//! Cascade orchestration.
//!
//! ## Stage chain
//!
//! ```text
//! encode -> [lat, lon, day_sin, day_cos]
//!   SST          -> + predicted_sst
//!   SSHA         -> + predicted_ssha          (scaler inverted)
//!   Chlorophyll  -> + predicted_chlorophyll
//!   Habitat      -> habitat_probability
//! ```
//!
//! The chain is checked once, when the orchestrator is built: every stage's
//! inputs must come from the base features or an earlier stage. After that
//! a run can only fail on bad input or a misbehaving model.

use std::collections::HashSet;

use sharko_core::{CascadeResult, Error, QueryPoint, Result, StageKind};
use tracing::debug;

use crate::encoder::FeatureEncoder;
use crate::habitat::HabitatClassifier;
use crate::registry::ModelRegistry;
use crate::stage::{RegressionStage, StageDescriptor};

/// A statically validated stage chain.
#[derive(Debug, Clone)]
pub struct CascadePlan {
    base: Vec<String>,
    stages: Vec<StageDescriptor>,
}

impl CascadePlan {
    /// Validate a chain of descriptors against the base features.
    ///
    /// Each stage must find all of its inputs among the base features and
    /// the outputs of the stages before it, and every stage that precedes
    /// it in [`StageKind::ALL`] must already have run. Violations are
    /// reported as [`Error::FeatureMismatch`] for the first offending stage.
    pub fn new<S: AsRef<str>>(base: &[S], stages: Vec<StageDescriptor>) -> Result<Self> {
        let base: Vec<String> = base.iter().map(|s| s.as_ref().to_string()).collect();
        let mut available: HashSet<&str> = base.iter().map(String::as_str).collect();
        let mut seen: Vec<StageKind> = Vec::with_capacity(stages.len());

        for descriptor in &stages {
            let name = descriptor.stage.name();
            if seen.contains(&descriptor.stage) {
                return Err(Error::InvalidConfig(format!(
                    "{name} stage appears twice in the cascade"
                )));
            }

            let mut missing: Vec<String> = descriptor
                .required
                .iter()
                .filter(|f| !available.contains(f.as_str()))
                .cloned()
                .collect();

            for earlier in &StageKind::ALL[..descriptor.stage.index()] {
                if seen.contains(earlier) {
                    continue;
                }
                let output = stages
                    .iter()
                    .find(|d| d.stage == *earlier)
                    .and_then(|d| d.produces.clone())
                    .or_else(|| earlier.default_output_feature().map(str::to_string))
                    .unwrap_or_else(|| earlier.name().to_string());
                if !missing.contains(&output) {
                    missing.push(output);
                }
            }

            if !missing.is_empty() {
                return Err(Error::feature_mismatch(name, missing));
            }

            if let Some(output) = &descriptor.produces {
                if !available.insert(output.as_str()) {
                    return Err(Error::InvalidConfig(format!(
                        "{name} stage output {output:?} is already defined"
                    )));
                }
            }
            seen.push(descriptor.stage);
            debug!("Cascade stage {} validated ({} inputs)", name, descriptor.required.len());
        }

        if seen.len() != StageKind::ALL.len() {
            return Err(Error::InvalidConfig(format!(
                "cascade needs all {} stages, got {}",
                StageKind::ALL.len(),
                seen.len()
            )));
        }

        Ok(Self { base, stages })
    }

    /// Base feature names.
    pub fn base(&self) -> &[String] {
        &self.base
    }

    /// Stage descriptors in execution order.
    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }
}

/// Runs the full cascade for one query point at a time.
///
/// Immutable after construction and safe to share across worker threads.
#[derive(Debug, Clone)]
pub struct CascadeOrchestrator {
    encoder: FeatureEncoder,
    plan: CascadePlan,
    sst: RegressionStage,
    ssha: RegressionStage,
    chlorophyll: RegressionStage,
    habitat: HabitatClassifier,
}

impl CascadeOrchestrator {
    /// Build from a registry, loading any stage that is not yet cached.
    pub fn from_registry(registry: &ModelRegistry, encoder: FeatureEncoder) -> Result<Self> {
        let sst = RegressionStage::new(registry.resolve(StageKind::Sst)?)?;
        let ssha = RegressionStage::new(registry.resolve(StageKind::Ssha)?)?;
        let chlorophyll = RegressionStage::new(registry.resolve(StageKind::Chlorophyll)?)?;
        let habitat = HabitatClassifier::new(registry.resolve(StageKind::Habitat)?)?;

        let plan = CascadePlan::new(
            encoder.feature_names(),
            vec![
                sst.descriptor(),
                ssha.descriptor(),
                chlorophyll.descriptor(),
                habitat.descriptor(),
            ],
        )?;

        debug!("Cascade orchestrator ready ({} stages)", plan.stages().len());
        Ok(Self {
            encoder,
            plan,
            sst,
            ssha,
            chlorophyll,
            habitat,
        })
    }

    /// The validated stage chain.
    pub fn plan(&self) -> &CascadePlan {
        &self.plan
    }

    /// The base feature encoder.
    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// Run the cascade for one point.
    pub fn run(&self, point: &QueryPoint) -> Result<CascadeResult> {
        let mut features = self.encoder.encode(point)?;

        let predicted_sst = self.sst.predict(&features)?;
        features.append(StageKind::Sst.name(), self.sst.output_feature(), predicted_sst)?;

        let predicted_ssha = self.ssha.predict(&features)?;
        features.append(StageKind::Ssha.name(), self.ssha.output_feature(), predicted_ssha)?;

        let predicted_chlorophyll = self.chlorophyll.predict(&features)?;
        features.append(
            StageKind::Chlorophyll.name(),
            self.chlorophyll.output_feature(),
            predicted_chlorophyll,
        )?;

        let habitat_probability = self.habitat.predict_probability(&features)?;

        Ok(CascadeResult {
            point: *point,
            predicted_sst,
            predicted_ssha,
            predicted_chlorophyll,
            habitat_probability,
        })
    }
}
