//! Supervised Training
//!
//! A plain custom loop over the lazy image pipelines: Adam on categorical
//! cross-entropy for a fixed number of epochs, validation accuracy after
//! every epoch, one test evaluation at the end. No early stopping and no
//! intermediate checkpoints; the artifact is written once, after the last
//! epoch.

use std::path::{Path, PathBuf};

use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        activation::log_softmax,
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor,
    },
};
use chrono::Utc;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::loader::ImageFolder;
use crate::dataset::pipeline::ImagePipeline;
use crate::model::artifact::{ModelArtifact, LABELS_FILE};
use crate::model::cnn::CropClassifier;
use crate::model::config::TrainingConfig;
use crate::utils::error::{PlantDoctorError, Result};
use crate::utils::format_duration;
use crate::utils::logging::TrainingLogger;
use crate::utils::metrics::Metrics;

/// History file written next to the artifact
pub const HISTORY_FILE: &str = "training_history.json";

/// Per-epoch training record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// 1-based epoch number
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
    pub duration_secs: f64,
}

/// Contents of `training_history.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub started_at: String,
    pub finished_at: String,
    pub config: TrainingConfig,
    pub class_names: Vec<String>,
    pub epochs: Vec<EpochRecord>,
    pub test_accuracy: f64,
    pub test_metrics: Metrics,
}

impl TrainingHistory {
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }
}

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub artifact_dir: PathBuf,
    pub num_classes: usize,
    pub epochs: Vec<EpochRecord>,
    pub test_metrics: Metrics,
}

impl TrainingSummary {
    /// Validation accuracy after the last epoch
    pub fn final_val_accuracy(&self) -> f64 {
        self.epochs.last().map(|e| e.val_accuracy).unwrap_or(0.0)
    }

    pub fn test_accuracy(&self) -> f64 {
        self.test_metrics.accuracy
    }
}

/// Predictions over one labelled split
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub predictions: Vec<usize>,
    pub targets: Vec<usize>,
    /// Mean batch loss
    pub loss: f64,
}

impl Evaluation {
    pub fn accuracy(&self) -> f64 {
        if self.targets.is_empty() {
            return 0.0;
        }
        let correct = self
            .predictions
            .iter()
            .zip(&self.targets)
            .filter(|(p, t)| p == t)
            .count();
        correct as f64 / self.targets.len() as f64
    }

    pub fn metrics(&self, class_names: &[String]) -> Metrics {
        Metrics::from_predictions(&self.predictions, &self.targets, class_names)
    }
}

/// Categorical cross-entropy of logits against one-hot labels
///
/// Computed through `log_softmax`, so large logits do not overflow.
pub fn categorical_cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    one_hot: Tensor<B, 2>,
) -> Tensor<B, 1> {
    (one_hot * log_softmax(logits, 1)).sum_dim(1).neg().mean()
}

/// Run training with the given configuration
///
/// # Type Parameters
/// * `B` - The autodiff backend to use (e.g., `Autodiff<NdArray>` or `Autodiff<Cuda>`)
pub fn run_training<B>(config: &TrainingConfig) -> Result<TrainingSummary>
where
    B: AutodiffBackend,
{
    config.validate()?;
    let started_at = Utc::now().to_rfc3339();

    println!("{}", "Initializing Training...".green().bold());
    let device = B::Device::default();
    let inner_device = <B::InnerBackend as Backend>::Device::default();
    println!("  Device: {:?}", device);

    // The training split fixes the class order; the other splits reuse it
    println!("{}", "Loading Dataset...".cyan());
    let train_folder = ImageFolder::scan(config.train_dir())?;
    let registry = train_folder.registry().clone();
    let valid_folder = ImageFolder::scan_with_registry(config.valid_dir(), &registry)?;
    let test_folder = ImageFolder::scan_with_registry(config.test_dir(), &registry)?;

    train_folder.stats().print();
    println!(
        "  Splits: {} train / {} valid / {} test",
        train_folder.len(),
        valid_folder.len(),
        test_folder.len()
    );

    let artifact = ModelArtifact::new(&config.output_dir);
    artifact.save_labels(&registry)?;
    info!("Class labels written to {:?}", artifact.labels_path());
    if config.export_labels_to_cwd {
        registry.save(Path::new(LABELS_FILE))?;
        info!("Class labels exported to ./{}", LABELS_FILE);
    }

    let train_pipeline = ImagePipeline::new(&train_folder, config.image_size, config.batch_size)
        .with_augmentation(config.augmentation.clone())
        .with_shuffle(config.seed);
    let valid_pipeline = ImagePipeline::new(&valid_folder, config.image_size, config.batch_size);
    let test_pipeline = ImagePipeline::new(&test_folder, config.image_size, config.batch_size);

    println!();
    println!("{}", "Creating Model...".cyan());
    let model_config = config.classifier_config(registry.len());
    let mut model: CropClassifier<B> = model_config.init(&device);
    print!("{}", model.summary(&model_config));

    let mut optimizer = AdamConfig::new().init();

    println!();
    println!("{}", "Training Configuration:".cyan().bold());
    println!("  Classes:        {}", registry.len());
    println!("  Epochs:         {}", config.epochs);
    println!("  Batch size:     {}", config.batch_size);
    println!("  Learning rate:  {}", config.learning_rate);
    println!("  Image size:     {}", config.image_size);
    println!("  Augmentation:   {}", train_pipeline.is_augmenting());
    println!();

    println!("{}", "Starting Training...".green().bold());
    let mut logger = TrainingLogger::new(config.epochs);
    let mut history = Vec::with_capacity(config.epochs);

    for epoch in 0..config.epochs {
        logger.start_epoch(epoch);
        println!(
            "{}",
            format!("Epoch {}/{}", epoch + 1, config.epochs).yellow().bold()
        );

        let progress = epoch_progress_bar(train_pipeline.batches_per_epoch() as u64);
        let mut epoch_loss = 0.0f64;
        let mut batches = 0usize;
        let mut correct = 0usize;
        let mut seen = 0usize;

        for batch in train_pipeline.epoch::<B>(epoch, &device) {
            let batch = batch?;

            let output = model.forward(batch.images);
            let loss = categorical_cross_entropy(output.clone(), batch.one_hot);

            let loss_value: f64 = loss.clone().into_scalar().elem();
            epoch_loss += loss_value;
            batches += 1;

            let batch_correct: i64 = output
                .argmax(1)
                .flatten::<1>(0, 1)
                .equal(batch.targets.clone())
                .int()
                .sum()
                .into_scalar()
                .elem();
            correct += batch_correct as usize;
            seen += batch.targets.dims()[0];

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(config.learning_rate, model, grads);

            progress.set_message(format!("loss {:.4}", loss_value));
            progress.inc(1);
        }
        progress.finish_and_clear();

        let train_loss = epoch_loss / batches.max(1) as f64;
        let train_accuracy = correct as f64 / seen.max(1) as f64;

        let validation = evaluate(&model.valid(), &valid_pipeline, &inner_device)?;
        let val_accuracy = validation.accuracy();
        let duration_secs = logger.end_epoch(train_loss, val_accuracy);

        println!(
            "  {} Loss: {:.4} | Train Acc: {:.2}% | Val Loss: {:.4} | Val Acc: {:.2}% | {}",
            "→".cyan(),
            train_loss,
            train_accuracy * 100.0,
            validation.loss,
            val_accuracy * 100.0,
            format_duration(duration_secs)
        );

        history.push(EpochRecord {
            epoch: epoch + 1,
            train_loss,
            train_accuracy,
            val_loss: validation.loss,
            val_accuracy,
            duration_secs,
        });
    }

    let trained = model.valid();

    println!();
    println!("{}", "Saving Model...".cyan());
    artifact.save(&trained, &model_config, &registry)?;
    println!("  Saved to: {:?}", artifact.dir());

    println!();
    println!("{}", "Evaluating on Test Set...".cyan());
    let test = evaluate(&trained, &test_pipeline, &inner_device)?;
    let test_metrics = test.metrics(registry.names());
    println!("Test Accuracy: {:.2}%", test_metrics.accuracy * 100.0);
    print!("{}", test_metrics.display());

    let history_path = artifact.dir().join(HISTORY_FILE);
    TrainingHistory {
        started_at,
        finished_at: Utc::now().to_rfc3339(),
        config: config.clone(),
        class_names: registry.names().to_vec(),
        epochs: history.clone(),
        test_accuracy: test_metrics.accuracy,
        test_metrics: test_metrics.clone(),
    }
    .save(&history_path)?;
    info!("Training history written to {:?}", history_path);

    println!();
    println!(
        "{} in {}",
        "Training Complete!".green().bold(),
        format_duration(logger.elapsed_secs())
    );

    Ok(TrainingSummary {
        artifact_dir: artifact.dir().to_path_buf(),
        num_classes: registry.len(),
        epochs: history,
        test_metrics,
    })
}

/// Evaluate the model on a non-augmenting pipeline
pub fn evaluate<B: Backend>(
    model: &CropClassifier<B>,
    pipeline: &ImagePipeline,
    device: &B::Device,
) -> Result<Evaluation> {
    let mut evaluation = Evaluation::default();
    let mut loss_sum = 0.0f64;
    let mut batches = 0usize;

    for batch in pipeline.epoch::<B>(0, device) {
        let batch = batch?;
        let logits = model.forward(batch.images);

        let loss: f64 = categorical_cross_entropy(logits.clone(), batch.one_hot)
            .into_scalar()
            .elem();
        loss_sum += loss;
        batches += 1;

        evaluation
            .predictions
            .extend(indices(logits.argmax(1).flatten::<1>(0, 1))?);
        evaluation.targets.extend(indices(batch.targets)?);
    }

    evaluation.loss = loss_sum / batches.max(1) as f64;
    Ok(evaluation)
}

fn indices<B: Backend>(tensor: Tensor<B, 1, Int>) -> Result<Vec<usize>> {
    let values: Vec<i64> = tensor
        .into_data()
        .convert::<i64>()
        .to_vec()
        .map_err(|e| PlantDoctorError::Model(format!("failed to read class indices: {:?}", e)))?;
    Ok(values.into_iter().map(|v| v as usize).collect())
}

fn epoch_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}
