//! Model artifacts: serialized bundles and their loaded form.
//!
//! ## Format
//!
//! Each stage is stored as one [`ArtifactBundle`] record, JSON or bincode:
//!
//! ```text
//! { format_version, stage, version, feature_names, output_feature?, model, scaler? }
//! ```
//!
//! The SSHA bundle carries its model and scaler in the same record so the
//! pair can never drift apart. Loading produces an [`Artifact`], whose
//! variant encodes whether a scaler is present.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sharko_core::{Error, Predictor, Result, StageKind, ValueScaler};

use crate::model::{ModelSpec, Scaler};

/// Current bundle format version.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// On-disk encoding of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactEncoding {
    Json,
    Bincode,
}

impl ArtifactEncoding {
    /// File extension used in model storage.
    pub const fn extension(self) -> &'static str {
        match self {
            ArtifactEncoding::Json => "json",
            ArtifactEncoding::Bincode => "bin",
        }
    }

    /// Encodings in probe order.
    pub const ALL: [ArtifactEncoding; 2] = [ArtifactEncoding::Json, ArtifactEncoding::Bincode];

    /// Infer the encoding from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(ArtifactEncoding::Json),
            "bin" => Some(ArtifactEncoding::Bincode),
            _ => None,
        }
    }
}

/// Serialized artifact record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub format_version: u32,
    pub stage: StageKind,
    /// Training run identifier.
    pub version: String,
    /// Input feature names, in the order the model consumes them.
    pub feature_names: Vec<String>,
    /// Name the output is appended under; the stage default when absent.
    #[serde(default)]
    pub output_feature: Option<String>,
    pub model: ModelSpec,
    #[serde(default)]
    pub scaler: Option<Scaler>,
}

impl ArtifactBundle {
    /// Create a bundle at the current format version.
    pub fn new(
        stage: StageKind,
        version: impl Into<String>,
        feature_names: Vec<String>,
        model: ModelSpec,
    ) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            stage,
            version: version.into(),
            feature_names,
            output_feature: None,
            model,
            scaler: None,
        }
    }

    /// Attach a paired scaler.
    pub fn with_scaler(mut self, scaler: Scaler) -> Self {
        self.scaler = Some(scaler);
        self
    }

    /// Override the output feature name.
    pub fn with_output_feature(mut self, name: impl Into<String>) -> Self {
        self.output_feature = Some(name.into());
        self
    }

    /// Decode a bundle from bytes.
    pub fn decode(name: &str, bytes: &[u8], encoding: ArtifactEncoding) -> Result<Self> {
        match encoding {
            ArtifactEncoding::Json => serde_json::from_slice(bytes)
                .map_err(|e| Error::corrupt_with(name, "failed to parse JSON bundle", e)),
            ArtifactEncoding::Bincode => bincode::deserialize(bytes)
                .map_err(|e| Error::corrupt_with(name, "failed to decode bincode bundle", e)),
        }
    }

    /// Encode a bundle to bytes.
    pub fn encode(&self, encoding: ArtifactEncoding) -> Result<Vec<u8>> {
        let name = self.stage.name();
        match encoding {
            ArtifactEncoding::Json => serde_json::to_vec_pretty(self)
                .map_err(|e| Error::io(format!("failed to serialize {name} bundle: {e}"))),
            ArtifactEncoding::Bincode => bincode::serialize(self)
                .map_err(|e| Error::io(format!("failed to serialize {name} bundle: {e}"))),
        }
    }

    /// Write the bundle to `path`, choosing the encoding from its extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        let encoding = ArtifactEncoding::from_path(path).ok_or_else(|| {
            Error::io(format!("unknown artifact extension: {}", path.display()))
        })?;
        let bytes = self.encode(encoding)?;

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Validate the record and build the loaded artifact.
    pub fn into_artifact(self) -> Result<Artifact> {
        let name = self.stage.name();

        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(Error::corrupt(
                name,
                format!(
                    "bundle format version mismatch: expected {}, got {}",
                    ARTIFACT_FORMAT_VERSION, self.format_version
                ),
            ));
        }
        self.model
            .validate()
            .map_err(|e| Error::corrupt(name, format!("invalid model: {e}")))?;

        let model = Model::new(self.stage, self.feature_names, Arc::new(self.model))
            .with_version(self.version);
        let model = match self.output_feature {
            Some(output) => model.with_output_feature(output),
            None => model,
        };

        Ok(match self.scaler {
            Some(scaler) => {
                scaler.validate().map_err(|e| match e {
                    Error::ArtifactCorrupt { message, .. } => Error::corrupt(name, message),
                    other => other,
                })?;
                Artifact::Scaled(model, Arc::new(scaler))
            }
            None => Artifact::Simple(model),
        })
    }
}

/// A loaded model with the metadata it was trained under.
#[derive(Clone)]
pub struct Model {
    stage: StageKind,
    version: String,
    feature_names: Vec<String>,
    output_feature: Option<String>,
    predictor: Arc<dyn Predictor>,
}

impl Model {
    /// Wrap a predictor for `stage`, consuming `feature_names` in order.
    pub fn new(stage: StageKind, feature_names: Vec<String>, predictor: Arc<dyn Predictor>) -> Self {
        Self {
            stage,
            version: "unversioned".to_string(),
            feature_names,
            output_feature: stage.default_output_feature().map(str::to_string),
            predictor,
        }
    }

    /// Set the training run identifier.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Override the output feature name.
    pub fn with_output_feature(mut self, name: impl Into<String>) -> Self {
        self.output_feature = Some(name.into());
        self
    }

    /// Stage this model was trained for.
    pub fn stage(&self) -> StageKind {
        self.stage
    }

    /// Training run identifier.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Input feature names in model order.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Name the output is appended under (`None` for the classifier).
    pub fn output_feature(&self) -> Option<&str> {
        self.output_feature.as_deref()
    }

    /// The underlying predictor.
    pub fn predictor(&self) -> &dyn Predictor {
        self.predictor.as_ref()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("stage", &self.stage)
            .field("version", &self.version)
            .field("feature_names", &self.feature_names)
            .field("output_feature", &self.output_feature)
            .field("predictor", &self.predictor.describe())
            .finish()
    }
}

/// A loaded artifact: a model alone, or a model paired with its scaler.
#[derive(Debug, Clone)]
pub enum Artifact {
    Simple(Model),
    Scaled(Model, Arc<dyn ValueScaler>),
}

impl Artifact {
    /// The wrapped model.
    pub fn model(&self) -> &Model {
        match self {
            Artifact::Simple(model) | Artifact::Scaled(model, _) => model,
        }
    }

    /// The paired scaler, if any.
    pub fn scaler(&self) -> Option<&dyn ValueScaler> {
        match self {
            Artifact::Simple(_) => None,
            Artifact::Scaled(_, scaler) => Some(scaler.as_ref()),
        }
    }

    /// Stage the artifact was trained for.
    pub fn stage(&self) -> StageKind {
        self.model().stage()
    }

    /// Check the artifact against the contract of the stage it is resolved
    /// for.
    pub fn validate_for(&self, stage: StageKind) -> Result<()> {
        let name = stage.name();
        let model = self.model();

        if model.stage() != stage {
            return Err(Error::corrupt(
                name,
                format!("artifact was trained for the {} stage", model.stage()),
            ));
        }

        let features = model.feature_names();
        if features.is_empty() {
            return Err(Error::corrupt(name, "artifact declares no feature names"));
        }
        let mut seen = std::collections::HashSet::with_capacity(features.len());
        if let Some(dup) = features.iter().find(|f| !seen.insert(f.as_str())) {
            return Err(Error::corrupt(
                name,
                format!("feature {dup:?} is declared twice"),
            ));
        }
        if let Some(width) = model.predictor().n_features() {
            if width != features.len() {
                return Err(Error::corrupt(
                    name,
                    format!(
                        "model expects {width} inputs but {} feature names are declared",
                        features.len()
                    ),
                ));
            }
        }

        match (stage, model.output_feature()) {
            (StageKind::Habitat, Some(output)) => {
                return Err(Error::corrupt(
                    name,
                    format!("classifier must not declare an output feature ({output:?})"),
                ));
            }
            (StageKind::Habitat, None) => {}
            (_, None) => return Err(Error::corrupt(name, "regressor has no output feature")),
            (_, Some(output)) if features.iter().any(|f| f == output) => {
                return Err(Error::corrupt(
                    name,
                    format!("output feature {output:?} is also an input"),
                ));
            }
            _ => {}
        }

        match (stage.requires_scaler(), self) {
            (true, Artifact::Simple(_)) => Err(Error::corrupt(
                name,
                "scaler expected in bundle but absent",
            )),
            (true, Artifact::Scaled(_, scaler)) => scaler.validate().map_err(|e| match e {
                Error::ArtifactCorrupt { message, .. } => Error::corrupt(name, message),
                other => other,
            }),
            (false, Artifact::Scaled(..)) => Err(Error::corrupt(
                name,
                "unexpected scaler in bundle",
            )),
            (false, Artifact::Simple(_)) => Ok(()),
        }
    }
}
