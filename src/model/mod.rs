//! Model module: the CNN, its configuration and persistence
//!
//! - `cnn`: the crop disease classifier (Burn modules)
//! - `config`: training hyperparameters
//! - `labels`: the class index ↔ name registry
//! - `artifact`: weights + architecture + registry on disk as one unit

pub mod artifact;
pub mod cnn;
pub mod config;
pub mod labels;

pub use artifact::{LoadedModel, ModelArtifact};
pub use cnn::{CropClassifier, CropClassifierConfig};
pub use config::TrainingConfig;
pub use labels::LabelRegistry;
