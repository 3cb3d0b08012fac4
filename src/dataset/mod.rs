//! Dataset module: class-directory scanning, augmentation and batching
//!
//! Expected layout:
//!
//! ```text
//! data_dir/
//! ├── train/<class_name>/<image>
//! ├── valid/<class_name>/<image>
//! └── test/<class_name>/<image>
//! ```

pub mod augmentation;
pub mod burn_dataset;
pub mod loader;
pub mod pipeline;

pub use augmentation::{AugmentationConfig, Augmenter};
pub use burn_dataset::{CropBatch, CropBatcher, CropItem, ImageFolderDataset};
pub use loader::{load_rgb_image, to_chw, DatasetStats, ImageFolder, ImageSample};
pub use pipeline::{BatchStream, EpochBatches, ImagePipeline};

/// Split directory names under the data root
pub const TRAIN_SPLIT: &str = "train";
pub const VALID_SPLIT: &str = "valid";
pub const TEST_SPLIT: &str = "test";
