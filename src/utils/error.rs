//! Error Handling Module
//!
//! Defines the error taxonomy for plant-doctor.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for plant-doctor operations
#[derive(Error, Debug)]
pub enum PlantDoctorError {
    /// Malformed or empty dataset directory tree
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Label registry and model disagree on the number of classes
    #[error("Artifact mismatch: label registry has {registry} classes but the model outputs {model}")]
    ArtifactMismatch { registry: usize, model: usize },

    /// Undecodable or wrong-shape input image
    #[error("Failed to load image at '{}': {reason}", path.display())]
    ImageLoad { path: PathBuf, reason: String },

    /// Error with model construction, persistence or forward pass
    #[error("Model error: {0}")]
    Model(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlantDoctorError {
    /// Build an image load error for `path`
    pub fn image_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ImageLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for PlantDoctorError {
    fn from(err: serde_json::Error) -> Self {
        PlantDoctorError::Serialization(err.to_string())
    }
}

/// Convenience Result type for plant-doctor operations
pub type Result<T> = std::result::Result<T, PlantDoctorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlantDoctorError::Dataset("no class directories".to_string());
        assert_eq!(format!("{}", err), "Dataset error: no class directories");
    }

    #[test]
    fn test_image_load_error() {
        let err = PlantDoctorError::image_load("/path/to/leaf.jpg", "unsupported format");
        let message = format!("{}", err);
        assert!(message.contains("leaf.jpg"));
        assert!(message.contains("unsupported format"));
    }

    #[test]
    fn test_artifact_mismatch_display() {
        let err = PlantDoctorError::ArtifactMismatch {
            registry: 3,
            model: 2,
        };
        assert!(format!("{}", err).contains("3 classes"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PlantDoctorError = io_err.into();
        assert!(matches!(err, PlantDoctorError::Io(_)));
    }
}
