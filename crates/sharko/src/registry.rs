//! Model registry: resolves cascade stages to loaded artifacts.
//!
//! ## Loading
//!
//! ```text
//! resolve(stage)
//!   -> slot.cell hit?            -> Arc<Artifact> (no lock)
//!   -> slot.lock                 (one loader per stage)
//!      -> source.load(stage)     (I/O + decode)
//!      -> validate_for(stage)    (stage contract)
//!      -> slot.cell.set
//! ```
//!
//! Each stage is loaded at most once per registry. Failed loads are not
//! cached, so a later call retries.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde::Serialize;
use sharko_core::{Error, Result, StageKind};
use tracing::{debug, info, warn};

use crate::artifact::{Artifact, ArtifactBundle, ArtifactEncoding};

/// Version name that selects the newest directory under the model root.
pub const LATEST_VERSION: &str = "latest";

/// Where artifacts come from.
pub trait ArtifactSource: Send + Sync + fmt::Debug {
    /// Load the artifact for `stage`.
    fn load(&self, stage: StageKind) -> Result<Artifact>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}

/// Artifacts stored as `<root>/<version>/<stage>.{json,bin}`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    version: String,
}

impl DirectorySource {
    /// Create a source for one model version.
    pub fn new(root: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            version: version.into(),
        }
    }

    /// Create a source for the newest version under `root`.
    ///
    /// Versions are compared by directory name, so date-stamped names sort
    /// chronologically.
    pub fn latest(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let entries = std::fs::read_dir(&root)
            .map_err(|_| Error::not_found(LATEST_VERSION, Some(root.clone())))?;

        let mut newest: Option<String> = None;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if newest.as_deref().map_or(true, |n| name > n) {
                    newest = Some(name.to_string());
                }
            }
        }

        let version = newest.ok_or_else(|| Error::not_found(LATEST_VERSION, Some(root.clone())))?;
        debug!("Resolved latest model version: {}", version);
        Ok(Self::new(root, version))
    }

    /// Create a source, resolving [`LATEST_VERSION`].
    pub fn open(root: impl Into<PathBuf>, version: &str) -> Result<Self> {
        if version == LATEST_VERSION {
            Self::latest(root)
        } else {
            Ok(Self::new(root, version))
        }
    }

    /// Model version this source reads.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Directory holding this version's bundles.
    pub fn version_dir(&self) -> PathBuf {
        self.root.join(&self.version)
    }

    /// Path a bundle for `stage` would be written to.
    pub fn bundle_path(&self, stage: StageKind, encoding: ArtifactEncoding) -> PathBuf {
        self.version_dir()
            .join(format!("{}.{}", stage.name(), encoding.extension()))
    }

    fn locate(&self, stage: StageKind) -> Result<(PathBuf, ArtifactEncoding)> {
        ArtifactEncoding::ALL
            .into_iter()
            .map(|encoding| (self.bundle_path(stage, encoding), encoding))
            .find(|(path, _)| path.is_file())
            .ok_or_else(|| {
                Error::not_found(
                    stage.name(),
                    Some(self.bundle_path(stage, ArtifactEncoding::Json)),
                )
            })
    }
}

impl ArtifactSource for DirectorySource {
    fn load(&self, stage: StageKind) -> Result<Artifact> {
        let (path, encoding) = self.locate(stage)?;
        debug!("Reading {} bundle from {}", stage, path.display());

        let bytes = std::fs::read(&path)?;
        let bundle = ArtifactBundle::decode(stage.name(), &bytes, encoding)?;
        if bundle.version != self.version {
            warn!(
                "{} bundle declares version {} but is stored under {}",
                stage, bundle.version, self.version
            );
        }
        bundle.into_artifact()
    }

    fn location(&self) -> String {
        self.version_dir().display().to_string()
    }
}

/// Artifacts held in memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    artifacts: HashMap<StageKind, Artifact>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artifact under its own stage.
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.insert(artifact.stage(), artifact);
        self
    }

    /// Add an artifact under an explicit stage.
    pub fn insert(&mut self, stage: StageKind, artifact: Artifact) {
        self.artifacts.insert(stage, artifact);
    }
}

impl ArtifactSource for MemorySource {
    fn load(&self, stage: StageKind) -> Result<Artifact> {
        self.artifacts
            .get(&stage)
            .cloned()
            .ok_or_else(|| Error::not_found(stage.name(), None))
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[derive(Default)]
struct Slot {
    cell: OnceLock<Arc<Artifact>>,
    load_lock: Mutex<()>,
}

/// Summary of a loaded artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub stage: StageKind,
    pub version: String,
    pub feature_names: Vec<String>,
    pub output_feature: Option<String>,
    pub scaled: bool,
    pub model: String,
}

impl ArtifactSummary {
    fn new(artifact: &Artifact) -> Self {
        let model = artifact.model();
        Self {
            stage: model.stage(),
            version: model.version().to_string(),
            feature_names: model.feature_names().to_vec(),
            output_feature: model.output_feature().map(str::to_string),
            scaled: artifact.scaler().is_some(),
            model: model.predictor().describe(),
        }
    }
}

/// Registry of cascade artifacts.
///
/// Construct once and share by reference or `Arc`; loaded artifacts are
/// read-only and handed out as `Arc<Artifact>`.
pub struct ModelRegistry {
    source: Box<dyn ArtifactSource>,
    slots: [Slot; 4],
    loads: AtomicUsize,
}

impl ModelRegistry {
    /// Create a registry over a source. Nothing is loaded yet.
    pub fn new(source: impl ArtifactSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            slots: Default::default(),
            loads: AtomicUsize::new(0),
        }
    }

    /// Create a registry over `<model_dir>/<version>`.
    pub fn open(model_dir: impl AsRef<Path>, version: &str) -> Result<Self> {
        Ok(Self::new(DirectorySource::open(
            model_dir.as_ref(),
            version,
        )?))
    }

    /// Resolve a stage, loading and validating it on first use.
    pub fn resolve(&self, stage: StageKind) -> Result<Arc<Artifact>> {
        let slot = &self.slots[stage.index()];
        if let Some(artifact) = slot.cell.get() {
            return Ok(Arc::clone(artifact));
        }

        let _guard = slot
            .load_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(artifact) = slot.cell.get() {
            return Ok(Arc::clone(artifact));
        }

        let artifact = self.source.load(stage)?;
        artifact.validate_for(stage)?;
        self.loads.fetch_add(1, Ordering::Relaxed);

        let model = artifact.model();
        info!(
            "Loaded {} artifact (version {}, {} features, {}{})",
            stage,
            model.version(),
            model.feature_names().len(),
            model.predictor().describe(),
            if artifact.scaler().is_some() { ", scaled" } else { "" },
        );

        let artifact = Arc::new(artifact);
        let _ = slot.cell.set(Arc::clone(&artifact));
        Ok(artifact)
    }

    /// Resolve a stage by its logical name (`sst`, `ssha`, `chlorophyll`,
    /// `habitat`).
    pub fn resolve_named(&self, name: &str) -> Result<Arc<Artifact>> {
        self.resolve(name.parse()?)
    }

    /// Load every stage now.
    pub fn preload(&self) -> Result<()> {
        info!("Preloading cascade artifacts from {}", self.source.location());
        for stage in StageKind::ALL {
            self.resolve(stage)?;
        }
        Ok(())
    }

    /// Summaries of all stages, loading any that are not yet cached.
    pub fn summaries(&self) -> Result<Vec<ArtifactSummary>> {
        StageKind::ALL
            .into_iter()
            .map(|stage| self.resolve(stage).map(|a| ArtifactSummary::new(&a)))
            .collect()
    }

    /// Check whether a stage is already cached.
    pub fn is_loaded(&self, stage: StageKind) -> bool {
        self.slots[stage.index()].cell.get().is_some()
    }

    /// Number of successful loads performed so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    /// Location of the underlying source.
    pub fn location(&self) -> String {
        self.source.location()
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loaded: Vec<StageKind> = StageKind::ALL
            .into_iter()
            .filter(|s| self.is_loaded(*s))
            .collect();
        f.debug_struct("ModelRegistry")
            .field("source", &self.source)
            .field("loaded", &loaded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Model;
    use crate::model::{LinearModel, ModelSpec, Scaler};

    fn linear(stage: StageKind, features: &[&str]) -> Artifact {
        let names = features.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let coefficients = vec![0.5; names.len()];
        Artifact::Simple(Model::new(
            stage,
            names,
            Arc::new(ModelSpec::Linear(LinearModel::new(1.0, coefficients))),
        ))
    }

    #[test]
    fn test_resolve_caches() {
        let registry = ModelRegistry::new(
            MemorySource::new().with_artifact(linear(StageKind::Sst, &["lat", "lon"])),
        );
        assert!(!registry.is_loaded(StageKind::Sst));

        let a = registry.resolve(StageKind::Sst).unwrap();
        let b = registry.resolve_named("sst").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.load_count(), 1);
    }

    #[test]
    fn test_unknown_name_and_missing_stage() {
        let registry = ModelRegistry::new(MemorySource::new());
        assert!(matches!(
            registry.resolve_named("salinity").unwrap_err(),
            Error::ArtifactNotFound { .. }
        ));
        assert!(matches!(
            registry.resolve(StageKind::Habitat).unwrap_err(),
            Error::ArtifactNotFound { .. }
        ));
        assert_eq!(registry.load_count(), 0);
    }

    #[test]
    fn test_stage_contract_checked_on_resolve() {
        let mut source = MemorySource::new();
        // SSHA without its scaler
        source.insert(StageKind::Ssha, linear(StageKind::Ssha, &["lat"]));
        // Artifact trained for another stage
        source.insert(StageKind::Chlorophyll, linear(StageKind::Sst, &["lat"]));
        let registry = ModelRegistry::new(source);

        assert!(matches!(
            registry.resolve(StageKind::Ssha).unwrap_err(),
            Error::ArtifactCorrupt { .. }
        ));
        assert!(matches!(
            registry.resolve(StageKind::Chlorophyll).unwrap_err(),
            Error::ArtifactCorrupt { .. }
        ));
        assert!(!registry.is_loaded(StageKind::Ssha));
    }

    #[test]
    fn test_scaled_ssha_accepted() {
        let model = match linear(StageKind::Ssha, &["lat", "predicted_sst"]) {
            Artifact::Simple(model) => model,
            Artifact::Scaled(..) => unreachable!(),
        };
        let artifact = Artifact::Scaled(model, Arc::new(Scaler::robust(0.0, 0.1)));
        let registry = ModelRegistry::new(MemorySource::new().with_artifact(artifact));
        assert!(registry.resolve(StageKind::Ssha).is_ok());
    }

    #[test]
    fn test_directory_latest_picks_newest() {
        let dir = tempfile::tempdir().unwrap();
        for version in ["2024-11-01", "2025-06-12", "2025-01-30"] {
            std::fs::create_dir(dir.path().join(version)).unwrap();
        }
        std::fs::write(dir.path().join("README"), "not a version").unwrap();

        let source = DirectorySource::open(dir.path(), LATEST_VERSION).unwrap();
        assert_eq!(source.version(), "2025-06-12");
    }

    #[test]
    fn test_directory_missing_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path(), "v1").unwrap();
        match registry.resolve(StageKind::Sst).unwrap_err() {
            Error::ArtifactNotFound { name, path } => {
                assert_eq!(name, "sst");
                assert!(path.unwrap().ends_with("v1/sst.json"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
