//! Training Configuration
//!
//! Hyperparameters, data locations and architecture widths for one training
//! run. A JSON file may override any subset of the defaults; CLI flags are
//! applied on top of that.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::augmentation::AugmentationConfig;
use crate::dataset::{TEST_SPLIT, TRAIN_SPLIT, VALID_SPLIT};
use crate::model::cnn::CropClassifierConfig;
use crate::utils::error::{PlantDoctorError, Result};
use crate::{DEFAULT_BATCH_SIZE, IMAGE_SIZE};

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Root holding the `train`, `valid` and `test` splits
    pub data_dir: PathBuf,

    /// Artifact directory (weights, architecture, labels, history)
    pub output_dir: PathBuf,

    /// Number of training epochs
    pub epochs: usize,

    /// Batch size for training and evaluation
    pub batch_size: usize,

    /// Adam learning rate
    pub learning_rate: f64,

    /// Random seed for shuffling and augmentation
    pub seed: u64,

    /// Square input size
    pub image_size: usize,

    /// Filters of the three convolution stages
    pub conv_filters: [usize; 3],

    /// Width of the hidden dense layer
    pub dense_units: usize,

    /// Dropout rate before the output layer
    pub dropout: f64,

    /// Augmentation applied to the training split
    pub augmentation: AugmentationConfig,

    /// Also write `class_labels.json` into the working directory
    pub export_labels_to_cwd: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("artifacts/crop_disease"),
            epochs: 20,
            batch_size: DEFAULT_BATCH_SIZE,
            learning_rate: 0.001,
            seed: 42,
            image_size: IMAGE_SIZE,
            conv_filters: [32, 64, 128],
            dense_units: 512,
            dropout: 0.5,
            augmentation: AugmentationConfig::default(),
            export_labels_to_cwd: false,
        }
    }
}

impl TrainingConfig {
    pub fn train_dir(&self) -> PathBuf {
        self.data_dir.join(TRAIN_SPLIT)
    }

    pub fn valid_dir(&self) -> PathBuf {
        self.data_dir.join(VALID_SPLIT)
    }

    pub fn test_dir(&self) -> PathBuf {
        self.data_dir.join(TEST_SPLIT)
    }

    /// Architecture for a registry of `num_classes` classes
    pub fn classifier_config(&self, num_classes: usize) -> CropClassifierConfig {
        CropClassifierConfig::new(num_classes)
            .with_input_size(self.image_size)
            .with_conv_filters(self.conv_filters)
            .with_dense_units(self.dense_units)
            .with_dropout(self.dropout)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(PlantDoctorError::Config(msg.to_string()));

        if self.epochs == 0 {
            return invalid("epochs must be greater than 0");
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be greater than 0");
        }
        if !(self.learning_rate > 0.0) {
            return invalid("learning_rate must be positive");
        }
        self.augmentation.validate().map_err(PlantDoctorError::Config)?;
        // num_classes is unknown here; any positive count checks the rest
        self.classifier_config(1)
            .validate()
            .map_err(PlantDoctorError::Config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Load configuration from a JSON file; missing keys take defaults
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 20);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.image_size, 224);
        assert_eq!(config.learning_rate, 0.001);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_split_directories() {
        let config = TrainingConfig {
            data_dir: PathBuf::from("/data/crops"),
            ..Default::default()
        };
        assert_eq!(config.train_dir(), PathBuf::from("/data/crops/train"));
        assert_eq!(config.valid_dir(), PathBuf::from("/data/crops/valid"));
        assert_eq!(config.test_dir(), PathBuf::from("/data/crops/test"));
    }

    #[test]
    fn test_validation() {
        let bad_epochs = TrainingConfig {
            epochs: 0,
            ..Default::default()
        };
        assert!(matches!(bad_epochs.validate(), Err(PlantDoctorError::Config(_))));

        let tiny_input = TrainingConfig {
            image_size: 10,
            ..Default::default()
        };
        assert!(tiny_input.validate().is_err());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("train.json");
        std::fs::write(&path, r#"{"epochs": 3, "batch_size": 8}"#).unwrap();

        let config = TrainingConfig::load(&path).unwrap();
        assert_eq!(config.epochs, 3);
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.seed, 42);
        assert_eq!(config.augmentation, AugmentationConfig::default());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("train.json");
        let config = TrainingConfig {
            epochs: 1,
            export_labels_to_cwd: true,
            augmentation: AugmentationConfig::none(),
            ..Default::default()
        };

        config.save(&path).unwrap();
        assert_eq!(TrainingConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_classifier_config() {
        let config = TrainingConfig {
            image_size: 64,
            dense_units: 128,
            ..Default::default()
        };
        let arch = config.classifier_config(4);
        assert_eq!(arch.num_classes, 4);
        assert_eq!(arch.input_size, 64);
        assert_eq!(arch.dense_units, 128);
    }
}
