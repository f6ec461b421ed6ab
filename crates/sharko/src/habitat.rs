//! Presence/absence classifier at the end of the cascade.

use std::sync::Arc;

use sharko_core::{Error, FeatureVector, Link, Result, StageKind};
use tracing::trace;

use crate::artifact::Artifact;
use crate::stage::StageDescriptor;

/// Wraps the habitat classification artifact.
#[derive(Debug, Clone)]
pub struct HabitatClassifier {
    artifact: Arc<Artifact>,
}

impl HabitatClassifier {
    /// Wrap a classifier artifact.
    pub fn new(artifact: Arc<Artifact>) -> Result<Self> {
        if artifact.stage() != StageKind::Habitat {
            return Err(Error::corrupt(
                StageKind::Habitat.name(),
                format!("artifact was trained for the {} stage", artifact.stage()),
            ));
        }
        Ok(Self { artifact })
    }

    /// Inputs of the classifier.
    pub fn descriptor(&self) -> StageDescriptor {
        StageDescriptor::from_artifact(&self.artifact)
    }

    /// Link the artifact's raw output goes through.
    pub fn link(&self) -> Link {
        self.artifact.model().predictor().link()
    }

    /// Presence probability in `[0, 1]`.
    pub fn predict_probability(&self, features: &FeatureVector) -> Result<f64> {
        let name = StageKind::Habitat.name();
        let model = self.artifact.model();
        let inputs = features.select(name, model.feature_names())?;
        let probability = model.predictor().predict(&inputs);

        if !probability.is_finite() {
            return Err(Error::NonFinitePrediction {
                stage: name,
                value: probability,
            });
        }
        trace!("habitat stage -> {}", probability);
        Ok(probability.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Model;
    use crate::model::{LinearModel, ModelSpec};

    fn classifier(spec: LinearModel) -> HabitatClassifier {
        let model = Model::new(
            StageKind::Habitat,
            vec!["predicted_sst".to_string()],
            Arc::new(ModelSpec::Linear(spec)),
        );
        HabitatClassifier::new(Arc::new(Artifact::Simple(model))).unwrap()
    }

    fn features(sst: f64) -> FeatureVector {
        let mut fv = FeatureVector::new();
        fv.append("test", "predicted_sst", sst).unwrap();
        fv
    }

    #[test]
    fn test_margin_goes_through_sigmoid() {
        let c = classifier(LinearModel::logistic(-25.0, vec![1.0]));
        assert_eq!(c.link(), Link::Logistic);
        assert!((c.predict_probability(&features(25.0)).unwrap() - 0.5).abs() < 1e-12);
        let p = c.predict_probability(&features(27.0)).unwrap();
        assert!((p - 0.880_797_077_977_882_3).abs() < 1e-12);
    }

    #[test]
    fn test_identity_output_clamped() {
        let c = classifier(LinearModel::new(0.0, vec![0.1]));
        assert_eq!(c.predict_probability(&features(25.0)).unwrap(), 1.0);
        assert_eq!(c.predict_probability(&features(-3.0)).unwrap(), 0.0);
        assert!((c.predict_probability(&features(4.0)).unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_regression_artifact() {
        let model = Model::new(
            StageKind::Sst,
            vec!["lat".to_string()],
            Arc::new(ModelSpec::Linear(LinearModel::new(0.0, vec![1.0]))),
        );
        assert!(HabitatClassifier::new(Arc::new(Artifact::Simple(model))).is_err());
    }

    #[test]
    fn test_missing_forecast_feature() {
        let c = classifier(LinearModel::logistic(0.0, vec![1.0]));
        assert!(matches!(
            c.predict_probability(&FeatureVector::new()).unwrap_err(),
            Error::FeatureMismatch { stage: "habitat", .. }
        ));
    }
}
