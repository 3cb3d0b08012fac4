//! Inference Predictor Module
//!
//! Classifies single images: decode, resize to the model's input size,
//! rescale to [0, 1], one forward pass, arg-max, then resolve the index
//! through the registry saved with the model and enrich it from the disease
//! knowledge base.

use std::path::{Path, PathBuf};

use burn::tensor::{backend::Backend, Tensor, TensorData};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::dataset::loader::{is_image_file, load_rgb_image, to_chw};
use crate::inference::diseases::{DiseaseKnowledgeBase, DiseaseRecord};
use crate::model::artifact::ModelArtifact;
use crate::model::cnn::CropClassifier;
use crate::model::labels::LabelRegistry;
use crate::utils::error::{PlantDoctorError, Result};

/// Anything that maps one CHW image to a class probability vector
pub trait ProbabilityModel {
    /// Length of the probability vector
    fn num_classes(&self) -> usize;

    /// Square side length the model expects
    fn input_size(&self) -> usize;

    /// Probabilities for one image laid out as [3, size, size] in [0, 1]
    fn probabilities(&self, image: &[f32]) -> Result<Vec<f32>>;
}

/// A trained [`CropClassifier`] on a Burn backend
#[derive(Debug)]
pub struct BurnModel<B: Backend> {
    model: CropClassifier<B>,
    input_size: usize,
    device: B::Device,
}

impl<B: Backend> BurnModel<B> {
    pub fn new(model: CropClassifier<B>, input_size: usize, device: B::Device) -> Self {
        Self {
            model,
            input_size,
            device,
        }
    }
}

impl<B: Backend> ProbabilityModel for BurnModel<B> {
    fn num_classes(&self) -> usize {
        self.model.num_classes()
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn probabilities(&self, image: &[f32]) -> Result<Vec<f32>> {
        let size = self.input_size;
        if image.len() != 3 * size * size {
            return Err(PlantDoctorError::Model(format!(
                "expected {} input values, got {}",
                3 * size * size,
                image.len()
            )));
        }

        let input = Tensor::<B, 4>::from_floats(
            TensorData::new(image.to_vec(), [1, 3, size, size]),
            &self.device,
        );

        self.model
            .forward_softmax(input)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| PlantDoctorError::Model(format!("failed to read probabilities: {:?}", e)))
    }
}

/// Outcome of classifying one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub image_path: PathBuf,
    /// Arg-max class index
    pub class_index: usize,
    /// Registry name of `class_index`
    pub class_name: String,
    pub disease: DiseaseRecord,
    /// Probability of the predicted class, in [0, 1]
    pub confidence: f32,
    /// Full probability distribution over all classes
    pub probabilities: Vec<f32>,
}

impl Diagnosis {
    /// Confidence as a percentage with two decimals, e.g. `"90.00%"`
    pub fn confidence_percent(&self) -> String {
        format!("{:.2}%", self.confidence as f64 * 100.0)
    }

    /// `k` most likely `(class index, probability)` pairs
    pub fn top_k(&self, k: usize) -> Vec<(usize, f32)> {
        let mut indexed: Vec<(usize, f32)> = self.probabilities.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        indexed.truncate(k);
        indexed
    }

    /// The flat report shape returned to callers
    pub fn to_report(&self) -> DiagnosisReport {
        DiagnosisReport {
            disease_name: self.disease.title.clone(),
            description: self.disease.description.clone(),
            accuracy: self.confidence_percent(),
            class: self.class_name.clone(),
        }
    }

    /// Console text: the report fields plus the three most likely classes
    pub fn display(&self, registry: &LabelRegistry) -> String {
        let mut output = format!("Image: {}\n", self.image_path.display());

        output.push_str(&format!("  Disease Name: {}\n", self.disease.title));
        output.push_str(&format!("  Description:  {}\n", self.disease.description));
        output.push_str(&format!("  Accuracy:     {}\n", self.confidence_percent()));
        output.push_str(&format!(
            "  Class:        {} (index {})\n",
            self.class_name, self.class_index
        ));

        output.push_str("  Top predictions:\n");
        for (rank, (idx, prob)) in self.top_k(3).into_iter().enumerate() {
            output.push_str(&format!(
                "    {}. {} - {:.2}%\n",
                rank + 1,
                registry.name(idx).unwrap_or("?"),
                prob * 100.0
            ));
        }

        output
    }
}

/// Caller-facing result keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisReport {
    #[serde(rename = "Disease Name")]
    pub disease_name: String,
    #[serde(rename = "Description")]
    pub description: String,
    /// Confidence percentage, e.g. "90.00%"
    #[serde(rename = "Accuracy")]
    pub accuracy: String,
    #[serde(rename = "Class")]
    pub class: String,
}

/// Per-image result that never aborts a batch of queries
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InferenceReport {
    Success { image: PathBuf, report: DiagnosisReport },
    Failure { image: PathBuf, error: String },
}

impl InferenceReport {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn image(&self) -> &Path {
        match self {
            Self::Success { image, .. } | Self::Failure { image, .. } => image,
        }
    }
}

/// Single-image classifier bound to one model, its registry and a knowledge base
#[derive(Debug)]
pub struct Predictor<M: ProbabilityModel> {
    model: M,
    registry: LabelRegistry,
    knowledge: DiseaseKnowledgeBase,
}

impl<B: Backend> Predictor<BurnModel<B>> {
    /// Load a trained artifact for inference
    pub fn from_artifact(
        artifact: &ModelArtifact,
        knowledge: DiseaseKnowledgeBase,
        device: &B::Device,
    ) -> Result<Self> {
        let loaded = artifact.load::<B>(device)?;
        let model = BurnModel::new(loaded.model, loaded.config.input_size, device.clone());
        Self::new(model, loaded.registry, knowledge)
    }
}

impl<M: ProbabilityModel> Predictor<M> {
    /// Fails with `ArtifactMismatch` if the registry and model disagree
    pub fn new(model: M, registry: LabelRegistry, knowledge: DiseaseKnowledgeBase) -> Result<Self> {
        registry.ensure_matches(model.num_classes())?;
        Ok(Self {
            model,
            registry,
            knowledge,
        })
    }

    pub fn registry(&self) -> &LabelRegistry {
        &self.registry
    }

    pub fn knowledge(&self) -> &DiseaseKnowledgeBase {
        &self.knowledge
    }

    /// Classify one image file
    pub fn classify(&self, path: &Path) -> Result<Diagnosis> {
        let size = self.model.input_size();
        let img = load_rgb_image(path, size as u32)?;
        let probabilities = self.model.probabilities(&to_chw(&img))?;
        self.registry.ensure_matches(probabilities.len())?;
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(PlantDoctorError::Model(format!(
                "model returned a non-finite probability for {:?}",
                path
            )));
        }

        let (class_index, confidence) = argmax(&probabilities).ok_or_else(|| {
            PlantDoctorError::Model("model returned an empty probability vector".to_string())
        })?;
        let class_name = self
            .registry
            .name(class_index)
            .ok_or_else(|| PlantDoctorError::Model(format!("class index {} out of range", class_index)))?
            .to_string();
        let disease = self.knowledge.lookup(&class_name).clone();

        tracing::debug!(
            "{:?}: {} ({:.2}%)",
            path,
            class_name,
            confidence * 100.0
        );

        Ok(Diagnosis {
            image_path: path.to_path_buf(),
            class_index,
            class_name,
            disease,
            confidence,
            probabilities,
        })
    }

    /// Classify one image, folding any error into the report
    pub fn classify_report(&self, path: &Path) -> InferenceReport {
        match self.classify(path) {
            Ok(diagnosis) => InferenceReport::Success {
                image: path.to_path_buf(),
                report: diagnosis.to_report(),
            },
            Err(e) => {
                tracing::warn!("Inference failed for {:?}: {}", path, e);
                InferenceReport::Failure {
                    image: path.to_path_buf(),
                    error: e.to_string(),
                }
            }
        }
    }
}

/// Index and value of the largest probability; ties go to the lower index
///
/// Uses the IEEE total order, so the result never depends on where a NaN sits.
fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if b.total_cmp(&v).is_ge() => best,
            _ => Some((i, v)),
        })
}

/// Image files under `input`: the file itself, or a directory's images sorted
pub fn collect_images(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(PlantDoctorError::image_load(input, "no such file or directory"));
    }

    let mut images: Vec<PathBuf> = WalkDir::new(input)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_image_file(p))
        .collect();
    images.sort();
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::loader::tests::write_rgb;
    use crate::model::cnn::CropClassifierConfig;
    use burn_ndarray::NdArray;
    use image::{GrayImage, Luma};
    use tempfile::TempDir;

    type TestBackend = NdArray;

    /// Returns the same distribution for every image
    struct FixedModel {
        output: Vec<f32>,
        input_size: usize,
    }

    impl ProbabilityModel for FixedModel {
        fn num_classes(&self) -> usize {
            self.output.len()
        }

        fn input_size(&self) -> usize {
            self.input_size
        }

        fn probabilities(&self, image: &[f32]) -> Result<Vec<f32>> {
            assert_eq!(image.len(), 3 * self.input_size * self.input_size);
            assert!(image.iter().all(|v| (0.0..=1.0).contains(v)));
            Ok(self.output.clone())
        }
    }

    fn tomato_registry() -> LabelRegistry {
        LabelRegistry::from_class_names(["Tomato_healthy", "Tomato_Early_blight"]).unwrap()
    }

    fn fixed_predictor(output: Vec<f32>) -> Predictor<FixedModel> {
        Predictor::new(
            FixedModel {
                output,
                input_size: 224,
            },
            tomato_registry(),
            DiseaseKnowledgeBase::builtin(),
        )
        .unwrap()
    }

    #[test]
    fn test_classify_early_blight() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leaf.png");
        write_rgb(&path, 64, [120, 160, 40]);

        let predictor = fixed_predictor(vec![0.1, 0.9]);
        let diagnosis = predictor.classify(&path).unwrap();

        assert_eq!(diagnosis.class_name, "Tomato_Early_blight");
        assert_eq!(diagnosis.class_index, 1);
        assert_eq!(diagnosis.confidence, 0.9);

        let report = diagnosis.to_report();
        assert_eq!(report.disease_name, "Early Blight");
        assert_eq!(report.accuracy, "90.00%");
        assert_eq!(
            report.description,
            DiseaseKnowledgeBase::builtin().lookup("Tomato_Early_blight").description
        );
    }

    #[test]
    fn test_report_json_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leaf.png");
        write_rgb(&path, 32, [10, 200, 10]);

        let report = fixed_predictor(vec![0.1, 0.9]).classify(&path).unwrap().to_report();
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["Disease Name"], "Early Blight");
        assert_eq!(value["Accuracy"], "90.00%");
        assert_eq!(value["Class"], "Tomato_Early_blight");
        assert!(value["Description"].is_string());
    }

    #[test]
    fn test_unknown_class_uses_sentinel() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leaf.png");
        write_rgb(&path, 32, [10, 200, 10]);

        let predictor = Predictor::new(
            FixedModel {
                output: vec![0.7, 0.3],
                input_size: 16,
            },
            LabelRegistry::from_class_names(["Mystery_leaf", "Tomato_healthy"]).unwrap(),
            DiseaseKnowledgeBase::builtin(),
        )
        .unwrap();

        let diagnosis = predictor.classify(&path).unwrap();
        assert_eq!(diagnosis.disease, DiseaseRecord::unknown());
        assert_eq!(diagnosis.to_report().accuracy, "70.00%");
    }

    #[test]
    fn test_registry_model_mismatch() {
        let result = Predictor::new(
            FixedModel {
                output: vec![0.2, 0.3, 0.5],
                input_size: 16,
            },
            tomato_registry(),
            DiseaseKnowledgeBase::builtin(),
        );

        assert!(matches!(
            result,
            Err(PlantDoctorError::ArtifactMismatch { registry: 2, model: 3 })
        ));
    }

    #[test]
    fn test_bad_images_become_failure_reports() {
        let dir = TempDir::new().unwrap();
        let predictor = fixed_predictor(vec![0.1, 0.9]);

        let tiny = dir.path().join("tiny.png");
        write_rgb(&tiny, 1, [1, 2, 3]);
        assert!(matches!(predictor.classify(&tiny), Err(PlantDoctorError::ImageLoad { .. })));

        let gray = dir.path().join("gray.png");
        GrayImage::from_pixel(64, 64, Luma([90])).save(&gray).unwrap();
        let report = predictor.classify_report(&gray);
        assert!(!report.is_success());
        assert_eq!(report.image(), gray.as_path());

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["status"], "failure");
    }

    #[test]
    fn test_burn_model_classification_is_repeatable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leaf.png");
        write_rgb(&path, 48, [90, 140, 60]);

        let device = Default::default();
        let config = CropClassifierConfig::new(2)
            .with_input_size(32)
            .with_conv_filters([4, 8, 8])
            .with_dense_units(16);
        let model = BurnModel::new(config.init::<TestBackend>(&device), 32, device);
        let predictor = Predictor::new(model, tomato_registry(), DiseaseKnowledgeBase::builtin()).unwrap();

        let first = predictor.classify(&path).unwrap();
        let second = predictor.classify(&path).unwrap();

        assert_eq!(first.class_name, second.class_name);
        assert_eq!(first.confidence, second.confidence);

        let max = first.probabilities.iter().cloned().fold(f32::MIN, f32::max);
        assert_eq!(first.confidence, max);
        let sum: f32 = first.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_non_finite_probability_is_model_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leaf.png");
        write_rgb(&path, 64, [120, 160, 40]);

        for output in [vec![0.1, f32::NAN], vec![f32::NAN, 0.9], vec![f32::INFINITY, 0.0]] {
            let predictor = fixed_predictor(output);
            assert!(matches!(
                predictor.classify(&path),
                Err(PlantDoctorError::Model(_))
            ));
            assert!(!predictor.classify_report(&path).is_success());
        }
    }

    #[test]
    fn test_display_lists_report_fields_and_top_classes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leaf.png");
        write_rgb(&path, 64, [120, 160, 40]);

        let predictor = fixed_predictor(vec![0.1, 0.9]);
        let text = predictor.classify(&path).unwrap().display(predictor.registry());

        assert!(text.contains("Disease Name: Early Blight"));
        assert!(text.contains("Accuracy:     90.00%"));
        assert!(text.contains("1. Tomato_Early_blight - 90.00%"));
        assert!(text.contains("2. Tomato_healthy - 10.00%"));
    }

    #[test]
    fn test_argmax_ties_pick_lowest_index() {
        assert_eq!(argmax(&[0.5, 0.5]), Some((0, 0.5)));
        assert_eq!(argmax(&[0.1, 0.2, 0.7]), Some((2, 0.7)));
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[0.9, f32::NAN]).map(|(i, _)| i), Some(1));
    }

    #[test]
    fn test_collect_images() {
        let dir = TempDir::new().unwrap();
        write_rgb(&dir.path().join("b.png"), 8, [0, 0, 0]);
        write_rgb(&dir.path().join("nested/a.png"), 8, [0, 0, 0]);
        std::fs::write(dir.path().join("readme.txt"), "x").unwrap();

        let images = collect_images(dir.path()).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(collect_images(&images[0]).unwrap(), vec![images[0].clone()]);
        assert!(collect_images(&dir.path().join("missing")).is_err());
    }
}
