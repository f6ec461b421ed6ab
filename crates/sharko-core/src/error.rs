//! Error types for the habitat cascade.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for cascade operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Cascade error types.
///
/// Load-time errors (`ArtifactNotFound`, `ArtifactCorrupt`) abort a run before
/// inference starts. Input and stage-contract errors are reported per point.
#[derive(Debug, Error)]
pub enum Error {
    /// A named model artifact could not be located.
    #[error("artifact not found: {name} ({})", path.as_ref().map_or_else(|| "no path".to_string(), |p| p.display().to_string()))]
    ArtifactNotFound {
        name: String,
        path: Option<PathBuf>,
    },

    /// An artifact was located but is malformed or missing required fields.
    #[error("corrupt artifact {name}: {message}")]
    ArtifactCorrupt {
        name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Latitude or longitude outside the valid range.
    #[error("invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// A date could not be resolved to a day-of-year.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// A stage required features that were not available.
    #[error("feature mismatch in {stage} stage: missing {}", missing.join(", "))]
    FeatureMismatch {
        stage: &'static str,
        missing: Vec<String>,
    },

    /// A stage that must invert a scaler was given an artifact without one.
    #[error("{stage} artifact has no paired value scaler")]
    MissingScaler { stage: &'static str },

    /// A model produced NaN or infinity.
    #[error("{stage} stage produced a non-finite prediction ({value})")]
    NonFinitePrediction { stage: &'static str, value: f64 },

    /// Every point of a batch failed a stage contract.
    #[error("systemic mismatch: all {points} points failed ({first})")]
    SystemicMismatch { points: usize, first: String },

    /// Grid region or resolution is unusable.
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    /// Configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error from artifact storage or output files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an artifact-not-found error.
    pub fn not_found(name: impl Into<String>, path: Option<PathBuf>) -> Self {
        Error::ArtifactNotFound {
            name: name.into(),
            path,
        }
    }

    /// Create a corrupt artifact error.
    pub fn corrupt(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ArtifactCorrupt {
            name: name.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a corrupt artifact error carrying the underlying decode error.
    pub fn corrupt_with<E>(name: impl Into<String>, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::ArtifactCorrupt {
            name: name.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a feature mismatch error.
    pub fn feature_mismatch(stage: &'static str, missing: Vec<String>) -> Self {
        Error::FeatureMismatch { stage, missing }
    }

    /// Create an I/O error with a custom message.
    pub fn io(message: impl Into<String>) -> Self {
        Error::Io(std::io::Error::other(message.into()))
    }

    /// Check if the error only affects the point it was raised for.
    ///
    /// Recoverable errors are collected into a batch report; the rest abort
    /// the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InvalidCoordinate { .. }
                | Error::InvalidDate(_)
                | Error::FeatureMismatch { .. }
                | Error::MissingScaler { .. }
                | Error::NonFinitePrediction { .. }
        )
    }

    /// Check if the error is a stage contract violation.
    ///
    /// These indicate artifact or feature-set drift rather than bad input.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::FeatureMismatch { .. } | Error::MissingScaler { .. }
        )
    }

    /// Get error category for logs and reports.
    pub fn category(&self) -> &'static str {
        match self {
            Error::ArtifactNotFound { .. } => "artifact_not_found",
            Error::ArtifactCorrupt { .. } => "artifact_corrupt",
            Error::InvalidCoordinate { .. } => "invalid_coordinate",
            Error::InvalidDate(_) => "invalid_date",
            Error::FeatureMismatch { .. } => "feature_mismatch",
            Error::MissingScaler { .. } => "missing_scaler",
            Error::NonFinitePrediction { .. } => "non_finite_prediction",
            Error::SystemicMismatch { .. } => "systemic_mismatch",
            Error::InvalidRegion(_) => "invalid_region",
            Error::InvalidConfig(_) => "invalid_config",
            Error::Io(_) => "io_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_split() {
        let per_point = [
            Error::InvalidCoordinate {
                latitude: 91.0,
                longitude: 0.0,
            },
            Error::InvalidDate("2025-02-30".into()),
            Error::feature_mismatch("ssha", vec!["predicted_sst".into()]),
            Error::MissingScaler { stage: "ssha" },
        ];
        for err in &per_point {
            assert!(err.is_recoverable(), "{err} should be recoverable");
        }

        let fatal = [
            Error::not_found("sst", None),
            Error::corrupt("ssha", "scaler expected"),
            Error::io("disk gone"),
        ];
        for err in &fatal {
            assert!(!err.is_recoverable(), "{err} should be fatal");
        }
    }

    #[test]
    fn test_display_feature_mismatch() {
        let err = Error::feature_mismatch(
            "chlorophyll",
            vec!["predicted_sst".into(), "predicted_ssha".into()],
        );
        let msg = err.to_string();
        assert!(msg.contains("chlorophyll"));
        assert!(msg.contains("predicted_sst, predicted_ssha"));
        assert_eq!(err.category(), "feature_mismatch");
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_display_not_found_with_path() {
        let err = Error::not_found("habitat", Some(PathBuf::from("/models/v3/habitat.json")));
        assert!(err.to_string().contains("/models/v3/habitat.json"));

        let err = Error::not_found("kelp", None);
        assert!(err.to_string().contains("no path"));
    }

    #[test]
    fn test_corrupt_source_chain() {
        let inner = std::io::Error::other("truncated");
        let err = Error::corrupt_with("ssha", "failed to decode bundle", inner);
        assert!(std::error::Error::source(&err).is_some());
        assert!(std::error::Error::source(&Error::corrupt("ssha", "x")).is_none());
    }
}
