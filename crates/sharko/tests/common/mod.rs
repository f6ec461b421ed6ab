//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use sharko::{
    Artifact, ArtifactBundle, ArtifactEncoding, DirectorySource, LinearModel, Link, MemorySource,
    Model, ModelSpec, Predictor, RegressionTree, Scaler, StageKind, TreeEnsemble,
};

pub const BASE: [&str; 4] = ["lat", "lon", "day_sin", "day_cos"];

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn with_base(extra: &[&str]) -> Vec<String> {
    let mut all = names(&BASE);
    all.extend(names(extra));
    all
}

/// A predictor that returns a fixed output and records every input row.
#[derive(Debug)]
pub struct RecordingStub {
    output: f64,
    link: Link,
    seen: Mutex<Vec<Vec<f64>>>,
}

impl RecordingStub {
    pub fn new(output: f64) -> Arc<Self> {
        Arc::new(Self {
            output,
            link: Link::Identity,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn margin(output: f64) -> Arc<Self> {
        Arc::new(Self {
            output,
            link: Link::Logistic,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Vec<f64>> {
        self.seen.lock().unwrap().clone()
    }
}

impl Predictor for RecordingStub {
    fn predict_raw(&self, features: &[f64]) -> f64 {
        self.seen.lock().unwrap().push(features.to_vec());
        self.output
    }

    fn link(&self) -> Link {
        self.link
    }
}

/// Bundles for a small but realistic cascade of linear and tree models.
pub fn bundles(version: &str) -> Vec<ArtifactBundle> {
    vec![
        ArtifactBundle::new(
            StageKind::Sst,
            version,
            names(&BASE),
            ModelSpec::Linear(LinearModel::new(28.0, vec![-0.15, 0.01, 1.2, -0.8])),
        ),
        ArtifactBundle::new(
            StageKind::Ssha,
            version,
            with_base(&["predicted_sst"]),
            ModelSpec::Linear(LinearModel::new(-0.4, vec![0.01, 0.0, 0.3, -0.2, 0.02])),
        )
        .with_scaler(Scaler::robust_clipped(0.02, 0.15, -1.0, 1.0)),
        ArtifactBundle::new(
            StageKind::Chlorophyll,
            version,
            with_base(&["predicted_sst", "predicted_ssha"]),
            ModelSpec::TreeEnsemble(TreeEnsemble::boosted(
                6,
                vec![
                    RegressionTree::stump(4, 24.0, 0.6, 0.2),
                    RegressionTree::stump(5, 0.0, 0.1, -0.05),
                ],
                0.3,
                1.0,
            )),
        ),
        ArtifactBundle::new(
            StageKind::Habitat,
            version,
            with_base(&["predicted_sst", "predicted_ssha", "predicted_chlorophyll"]),
            ModelSpec::Linear(LinearModel::logistic(
                -6.0,
                vec![0.0, 0.0, 0.2, 0.1, 0.2, 1.5, 2.0],
            )),
        ),
    ]
}

/// In-memory source holding [`bundles`].
pub fn memory_source() -> MemorySource {
    bundles("test")
        .into_iter()
        .fold(MemorySource::new(), |source, bundle| {
            source.with_artifact(bundle.into_artifact().unwrap())
        })
}

/// Write [`bundles`] under `root/version`, using `encoding` for every stage.
pub fn write_store(root: &Path, version: &str, encoding: ArtifactEncoding) -> DirectorySource {
    let source = DirectorySource::new(root, version);
    std::fs::create_dir_all(source.version_dir()).unwrap();
    for bundle in bundles(version) {
        bundle
            .save(&source.bundle_path(bundle.stage, encoding))
            .unwrap();
    }
    source
}

/// Wrap a stub predictor as an artifact for `stage`.
pub fn stub_artifact(stage: StageKind, inputs: Vec<String>, stub: Arc<RecordingStub>) -> Artifact {
    let model = Model::new(stage, inputs, stub);
    match stage {
        StageKind::Ssha => Artifact::Scaled(model, Arc::new(Scaler::robust(0.1, 0.2))),
        _ => Artifact::Simple(model),
    }
}

/// The SSHA input list used by stub cascades.
pub fn ssha_inputs() -> Vec<String> {
    with_base(&["predicted_sst"])
}

pub fn chlorophyll_inputs() -> Vec<String> {
    with_base(&["predicted_sst", "predicted_ssha"])
}

pub fn habitat_inputs() -> Vec<String> {
    with_base(&["predicted_sst", "predicted_ssha", "predicted_chlorophyll"])
}
