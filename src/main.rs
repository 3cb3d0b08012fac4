//! Plant Doctor CLI
//!
//! Train a crop disease classifier from a directory-per-class corpus and
//! diagnose leaf photos with the resulting artifact.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use plant_doctor::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use plant_doctor::dataset::{ImageFolder, TEST_SPLIT, TRAIN_SPLIT, VALID_SPLIT};
use plant_doctor::inference::{collect_images, BurnModel, DiseaseKnowledgeBase, Predictor};
use plant_doctor::model::ModelArtifact;
use plant_doctor::training::run_training;
use plant_doctor::utils::format_duration;
use plant_doctor::utils::logging::{init_logging, LogConfig};
use plant_doctor::{AugmentationConfig, TrainingConfig};

/// Crop disease classification with Burn
#[derive(Parser, Debug)]
#[command(name = "plant-doctor")]
#[command(version = plant_doctor::VERSION)]
#[command(about = "Train and run a crop disease image classifier", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, default_value = "false", conflicts_with = "verbose")]
    quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train the classifier on train/valid/test class directories
    Train {
        /// Dataset root holding train/, valid/ and test/
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// JSON training config; flags below override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of training epochs
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Batch size for training and evaluation
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Adam learning rate
        #[arg(short, long)]
        learning_rate: Option<f64>,

        /// Random seed for shuffling and augmentation
        #[arg(long)]
        seed: Option<u64>,

        /// Artifact output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Train on the plain images without augmentation
        #[arg(long, default_value = "false")]
        no_augmentation: bool,

        /// Also write class_labels.json into the working directory
        #[arg(long, default_value = "false")]
        export_labels: bool,
    },

    /// Diagnose a single image or every image in a directory
    Infer {
        /// Path to input image or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Artifact directory produced by `train`
        #[arg(short, long, default_value = "artifacts/crop_disease")]
        model: PathBuf,

        /// JSON disease table replacing the built-in one
        #[arg(long)]
        diseases: Option<PathBuf>,

        /// Print one JSON report per image instead of text
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Show per-class image counts for each split
    Stats {
        /// Dataset root holding train/, valid/ and test/
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,
    },

    /// List the disease knowledge base
    Diseases {
        /// JSON disease table replacing the built-in one
        #[arg(long)]
        diseases: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else if cli.quiet {
        LogConfig::quiet()
    } else {
        LogConfig::default()
    };

    let _ = init_logging(&log_config);

    match cli.command {
        Commands::Train {
            data_dir,
            config,
            epochs,
            batch_size,
            learning_rate,
            seed,
            output_dir,
            no_augmentation,
            export_labels,
        } => {
            let mut training_config = match config {
                Some(path) => TrainingConfig::load(&path)
                    .with_context(|| format!("Failed to load training config {:?}", path))?,
                None => TrainingConfig::default(),
            };

            if let Some(data_dir) = data_dir {
                training_config.data_dir = data_dir;
            }
            if let Some(output_dir) = output_dir {
                training_config.output_dir = output_dir;
            }
            if let Some(epochs) = epochs {
                training_config.epochs = epochs;
            }
            if let Some(batch_size) = batch_size {
                training_config.batch_size = batch_size;
            }
            if let Some(learning_rate) = learning_rate {
                training_config.learning_rate = learning_rate;
            }
            if let Some(seed) = seed {
                training_config.seed = seed;
            }
            if no_augmentation {
                training_config.augmentation = AugmentationConfig::none();
            }
            training_config.export_labels_to_cwd |= export_labels;

            cmd_train(&training_config)?;
        }

        Commands::Infer {
            input,
            model,
            diseases,
            json,
        } => {
            cmd_infer(&input, &model, diseases.as_deref(), json)?;
        }

        Commands::Stats { data_dir } => {
            cmd_stats(&data_dir)?;
        }

        Commands::Diseases { diseases } => {
            cmd_diseases(diseases.as_deref())?;
        }
    }

    Ok(())
}

fn load_knowledge_base(path: Option<&Path>) -> Result<DiseaseKnowledgeBase> {
    match path {
        Some(path) => DiseaseKnowledgeBase::from_json_file(path)
            .with_context(|| format!("Failed to load disease table {:?}", path)),
        None => Ok(DiseaseKnowledgeBase::builtin()),
    }
}

fn cmd_train(config: &TrainingConfig) -> Result<()> {
    info!("Starting training");
    info!("  Data: {:?}", config.data_dir);
    info!("  Output: {:?}", config.output_dir);

    println!("{}", "Plant Doctor Training".cyan().bold());
    println!("  Data:    {}", config.data_dir.display());
    println!("  Output:  {}", config.output_dir.display());
    println!("  Backend: {}", backend_name());
    println!();

    let summary = run_training::<TrainingBackend>(config)?;

    println!();
    println!("{}", "Training Complete".green().bold());
    println!("  Classes:             {}", summary.num_classes);
    println!(
        "  Final val accuracy:  {:.2}%",
        summary.final_val_accuracy() * 100.0
    );
    println!("  Test accuracy:       {:.2}%", summary.test_accuracy() * 100.0);
    let total_secs: f64 = summary.epochs.iter().map(|e| e.duration_secs).sum();
    println!("  Training time:       {}", format_duration(total_secs));
    println!("  Artifact:            {}", summary.artifact_dir.display());

    Ok(())
}

fn cmd_infer(input: &Path, model: &Path, diseases: Option<&Path>, json: bool) -> Result<()> {
    info!("Running inference");
    info!("  Input: {:?}", input);
    info!("  Model: {:?}", model);

    let knowledge = load_knowledge_base(diseases)?;
    let artifact = ModelArtifact::new(model);
    let device = default_device();
    let predictor = Predictor::<BurnModel<DefaultBackend>>::from_artifact(&artifact, knowledge, &device)
        .with_context(|| format!("Failed to load model artifact {:?}", model))?;
    let images = collect_images(input)?;

    if !json {
        println!("{}", "Inference Configuration:".cyan().bold());
        println!("  Input:   {}", input.display());
        println!("  Model:   {}", model.display());
        println!("  Classes: {}", predictor.registry().len());
        println!("  Backend: {}", backend_name());
        println!("  Images:  {}", images.len());
        println!();
    }

    let mut failures = 0usize;
    for image in &images {
        if json {
            let report = predictor.classify_report(image);
            if !report.is_success() {
                failures += 1;
            }
            println!("{}", serde_json::to_string(&report)?);
            continue;
        }

        match predictor.classify(image) {
            Ok(diagnosis) => println!("{}", diagnosis.display(predictor.registry())),
            Err(e) => {
                failures += 1;
                println!("{} {}", "Image:".cyan(), image.display());
                println!("  {} {}", "Error:".red(), e);
                println!();
            }
        }
    }

    if !json {
        println!(
            "{} {} classified, {} failed",
            "Done:".green().bold(),
            images.len() - failures,
            failures
        );
    }

    Ok(())
}

fn cmd_stats(data_dir: &Path) -> Result<()> {
    info!("Computing dataset statistics for: {:?}", data_dir);

    let train = ImageFolder::scan(data_dir.join(TRAIN_SPLIT))
        .with_context(|| format!("Failed to scan {:?}", data_dir.join(TRAIN_SPLIT)))?;

    println!("{}", "Training split:".cyan().bold());
    train.stats().print();

    for split in [VALID_SPLIT, TEST_SPLIT] {
        let dir = data_dir.join(split);
        println!();
        match ImageFolder::scan_with_registry(&dir, train.registry()) {
            Ok(folder) => {
                println!("{}", format!("{} split:", split).cyan().bold());
                folder.stats().print();
            }
            Err(e) => println!("{} {}: {}", "Warning:".yellow(), split, e),
        }
    }

    Ok(())
}

fn cmd_diseases(diseases: Option<&Path>) -> Result<()> {
    let knowledge = load_knowledge_base(diseases)?;

    println!(
        "{}",
        format!("Disease Knowledge Base ({} entries):", knowledge.len())
            .cyan()
            .bold()
    );
    for (class_name, record) in knowledge.entries() {
        println!("  {} {}", class_name.green(), format!("({})", record.title).dimmed());
        println!("      {}", record.description);
    }

    Ok(())
}
