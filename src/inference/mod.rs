//! Inference module for single-image disease diagnosis
//!
//! This module provides:
//! - The disease knowledge base (class name → title, description)
//! - The predictor pairing a trained model with its label registry
//!
//! Image errors are reported per image; artifact errors surface when the
//! predictor is built.

pub mod diseases;
pub mod predictor;

pub use diseases::{DiseaseKnowledgeBase, DiseaseRecord};
pub use predictor::{
    collect_images, BurnModel, Diagnosis, DiagnosisReport, InferenceReport, Predictor,
    ProbabilityModel,
};
