//! Environmental regression stages (SST, SSHA, chlorophyll).

use std::sync::Arc;

use sharko_core::{Error, FeatureVector, Result, StageKind, ValueScaler};
use tracing::trace;

use crate::artifact::Artifact;

/// What a stage consumes and produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDescriptor {
    pub stage: StageKind,
    /// Input feature names in model order.
    pub required: Vec<String>,
    /// Feature appended after the stage runs (`None` for the classifier).
    pub produces: Option<String>,
}

impl StageDescriptor {
    /// Create a descriptor.
    pub fn new(stage: StageKind, required: Vec<String>, produces: Option<String>) -> Self {
        Self {
            stage,
            required,
            produces,
        }
    }

    /// Describe a loaded artifact.
    pub fn from_artifact(artifact: &Artifact) -> Self {
        let model = artifact.model();
        Self::new(
            model.stage(),
            model.feature_names().to_vec(),
            model.output_feature().map(str::to_string),
        )
    }
}

/// How a stage's raw model output becomes a feature value.
#[derive(Debug, Clone)]
enum Output {
    /// The model predicts in original units.
    Direct,
    /// The model was trained on a scaled target; map back through the scaler.
    Rescaled(Arc<dyn ValueScaler>),
}

/// A regression stage wrapping one artifact.
#[derive(Debug, Clone)]
pub struct RegressionStage {
    stage: StageKind,
    output: String,
    mode: Output,
    artifact: Arc<Artifact>,
}

impl RegressionStage {
    /// Wrap a regression artifact.
    ///
    /// A stage that needs an inverse transform must be given an
    /// [`Artifact::Scaled`], and no other stage may carry a scaler.
    pub fn new(artifact: Arc<Artifact>) -> Result<Self> {
        let stage = artifact.stage();
        if stage == StageKind::Habitat {
            return Err(Error::corrupt(
                stage.name(),
                "classifier artifact cannot run as a regression stage",
            ));
        }

        let mode = match (stage.requires_scaler(), artifact.as_ref()) {
            (true, Artifact::Simple(_)) => {
                return Err(Error::MissingScaler {
                    stage: stage.name(),
                })
            }
            (true, Artifact::Scaled(_, scaler)) => Output::Rescaled(Arc::clone(scaler)),
            (false, _) => Output::Direct,
        };
        artifact.validate_for(stage)?;

        let output = artifact
            .model()
            .output_feature()
            .ok_or_else(|| Error::corrupt(stage.name(), "regressor has no output feature"))?
            .to_string();
        Ok(Self {
            stage,
            output,
            mode,
            artifact,
        })
    }

    /// Stage this predictor runs.
    pub fn stage(&self) -> StageKind {
        self.stage
    }

    /// Name the prediction is appended under.
    pub fn output_feature(&self) -> &str {
        &self.output
    }

    /// Check if raw outputs are mapped back through a scaler.
    pub fn is_rescaled(&self) -> bool {
        matches!(self.mode, Output::Rescaled(_))
    }

    /// Inputs and output of this stage.
    pub fn descriptor(&self) -> StageDescriptor {
        StageDescriptor::from_artifact(&self.artifact)
    }

    /// Predict in original units.
    pub fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let name = self.stage.name();
        let model = self.artifact.model();
        let inputs = features.select(name, model.feature_names())?;
        let raw = model.predictor().predict(&inputs);

        let value = match &self.mode {
            Output::Direct => raw,
            Output::Rescaled(scaler) => scaler.inverse_transform(raw),
        };

        if !value.is_finite() {
            return Err(Error::NonFinitePrediction { stage: name, value });
        }
        trace!("{} stage -> {} = {}", name, self.output, value);
        Ok(value)
    }
}
