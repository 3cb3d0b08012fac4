//! # Plant Doctor
//!
//! Crop disease classification with the Burn framework: train a small
//! convolutional classifier on a directory-per-class image corpus, then
//! diagnose single leaf photos against a curated disease knowledge base.
//!
//! ## Modules
//!
//! - `dataset`: Directory scanning, augmentation and batch pipelines
//! - `model`: CNN architecture, label registry, training config and the on-disk artifact
//! - `training`: Fixed-epoch supervised training and evaluation
//! - `inference`: Disease knowledge base and the single-image predictor
//! - `utils`: Errors, logging and classification metrics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use plant_doctor::backend::{default_device, DefaultBackend};
//! use plant_doctor::inference::{BurnModel, DiseaseKnowledgeBase, Predictor};
//! use plant_doctor::model::ModelArtifact;
//!
//! let artifact = ModelArtifact::new("artifacts/crop_disease");
//! let predictor = Predictor::<BurnModel<DefaultBackend>>::from_artifact(
//!     &artifact,
//!     DiseaseKnowledgeBase::builtin(),
//!     &default_device(),
//! )?;
//! let diagnosis = predictor.classify("leaf.jpg".as_ref())?;
//! println!("{} ({})", diagnosis.disease.title, diagnosis.confidence_percent());
//! ```

pub mod backend;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::{Augmenter, AugmentationConfig, ImageFolder, ImagePipeline};
pub use inference::{Diagnosis, DiagnosisReport, DiseaseKnowledgeBase, InferenceReport, Predictor};
pub use model::{CropClassifier, CropClassifierConfig, LabelRegistry, ModelArtifact, TrainingConfig};
pub use training::{run_training, TrainingSummary};
pub use utils::error::{PlantDoctorError, Result};
pub use utils::metrics::{ConfusionMatrix, Metrics};

/// Default square input size
pub const IMAGE_SIZE: usize = 224;

/// Default batch size for training and evaluation
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Images with a side shorter than this are rejected before resizing
pub const MIN_IMAGE_SIDE: u32 = 8;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
