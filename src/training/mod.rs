//! Training module
//!
//! Fixed-epoch supervised training that ends in a single model artifact.

pub mod supervised;

pub use supervised::{
    categorical_cross_entropy, evaluate, run_training, EpochRecord, Evaluation, TrainingHistory,
    TrainingSummary,
};
