//! Model Artifact
//!
//! Weights, architecture and label registry live in one directory and are
//! always read back together:
//!
//! ```text
//! artifact_dir/
//! ├── model.mpk            weights (CompactRecorder)
//! ├── model_config.json    CropClassifierConfig
//! └── class_labels.json    {"0": "class", ...}
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use burn::{
    config::Config,
    module::Module,
    record::CompactRecorder,
    tensor::backend::Backend,
};
use tracing::info;

use crate::model::cnn::{CropClassifier, CropClassifierConfig};
use crate::model::labels::LabelRegistry;
use crate::utils::error::{PlantDoctorError, Result};

/// Weights file stem; the recorder appends `.mpk`
pub const WEIGHTS_STEM: &str = "model";
pub const CONFIG_FILE: &str = "model_config.json";
pub const LABELS_FILE: &str = "class_labels.json";

/// A model artifact directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    dir: PathBuf,
}

/// Classifier restored from an artifact, paired with its registry
#[derive(Debug)]
pub struct LoadedModel<B: Backend> {
    pub model: CropClassifier<B>,
    pub config: CropClassifierConfig,
    pub registry: LabelRegistry,
}

impl ModelArtifact {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path handed to the recorder, without the `.mpk` extension
    pub fn weights_path(&self) -> PathBuf {
        self.dir.join(WEIGHTS_STEM)
    }

    /// The weights file as it exists on disk
    pub fn weights_file(&self) -> PathBuf {
        self.weights_path().with_extension("mpk")
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn labels_path(&self) -> PathBuf {
        self.dir.join(LABELS_FILE)
    }

    /// Whether all three files are present
    pub fn is_complete(&self) -> bool {
        self.weights_file().is_file()
            && self.config_path().is_file()
            && self.labels_path().is_file()
    }

    /// Write the registry alone, before any weights exist
    ///
    /// Weights and architecture left by an earlier run are deleted first:
    /// until [`ModelArtifact::save`] completes, the directory holds the new
    /// registry and nothing it could be mispaired with.
    pub fn save_labels(&self, registry: &LabelRegistry) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        for stale in [self.weights_file(), self.config_path()] {
            match std::fs::remove_file(&stale) {
                Ok(()) => info!("Removed {:?} from a previous run", stale),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        registry.save(&self.labels_path())
    }

    /// Write weights, architecture and registry
    pub fn save<B: Backend>(
        &self,
        model: &CropClassifier<B>,
        config: &CropClassifierConfig,
        registry: &LabelRegistry,
    ) -> Result<()> {
        registry.ensure_matches(config.num_classes)?;
        registry.ensure_matches(model.num_classes())?;

        std::fs::create_dir_all(&self.dir)?;
        config.save(self.config_path())?;
        model
            .clone()
            .save_file(self.weights_path(), &CompactRecorder::new())
            .map_err(|e| PlantDoctorError::Model(format!("failed to save weights: {}", e)))?;
        registry.save(&self.labels_path())?;

        info!("Model artifact saved to {:?}", self.dir);
        Ok(())
    }

    /// Restore the classifier and its registry
    ///
    /// Fails with `ArtifactMismatch` when the registry size differs from the
    /// configured output width or from the width of the stored weights.
    pub fn load<B: Backend>(&self, device: &B::Device) -> Result<LoadedModel<B>> {
        let registry = LabelRegistry::load(&self.labels_path())?;

        let config = CropClassifierConfig::load(self.config_path()).map_err(|e| {
            PlantDoctorError::Config(format!(
                "failed to read {:?}: {}",
                self.config_path(),
                e
            ))
        })?;
        config.validate().map_err(PlantDoctorError::Config)?;
        registry.ensure_matches(config.num_classes)?;

        let model = config
            .init::<B>(device)
            .load_file(self.weights_path(), &CompactRecorder::new(), device)
            .map_err(|e| PlantDoctorError::Model(format!("failed to load weights: {}", e)))?;
        registry.ensure_matches(model.num_classes())?;

        info!(
            "Loaded model artifact from {:?} ({} classes)",
            self.dir,
            registry.len()
        );

        Ok(LoadedModel {
            model,
            config,
            registry,
        })
    }
}
